//! CPU overview dashboard in a team group, plus a detector derived from one of
//! its charts.
//!
//! ```text
//! SIGNALFORM_API_TOKEN=... cargo run --example cpu-dashboard -- create --dry-run
//! ```

use anyhow::Result;
use signalform::charts::{Chart, PlotType, TimeConfig};
use signalform::cli::CliBuilder;
use signalform::dashboards::{
    Dashboard, DashboardFilters, DashboardGroup, EventOverlay, EventSignal, EventType, FilterTime,
    FilterVariable,
};
use signalform::error::ValidationError;
use signalform::detectors::{Detector, Notification, Rule, Severity};
use signalform::flow::{Aggregation, Assignment, Expr, Program, data, detect, filter, gt, when};

const APP: &str = "shoeadmin";

fn cpu_program() -> Result<Program> {
    Ok(Program::new([data("cpu.utilization")
        .kwarg("filter", filter("app", APP))
        .mean(Aggregation::by(["host"]))
        .publish("A")])?)
}

fn main() -> Result<()> {
    let cpu = Chart::time_series()
        .with_name("CPU by host")?
        .with_description(format!("Mean CPU utilization for {APP}"))
        .with_program(cpu_program()?)?
        .with_default_plot_type(PlotType::Area)?
        .with_time(TimeConfig::relative(60 * 60 * 1000)?)?;

    let busiest = Chart::list()
        .with_name("Busiest hosts")?
        .with_program(Program::new([data("cpu.utilization")
            .kwarg("filter", filter("app", APP))
            .top(Some(5), None, Aggregation::by(["host"]))
            .publish("A")])?)?;

    let dashboard = Dashboard::new()
        .with_name(format!("{APP} CPU"))?
        .with_charts([cpu.clone(), busiest])?
        .with_filters(
            DashboardFilters::new()
                .with_variables(vec![FilterVariable::new("host", "Host")?])
                .with_time(FilterTime::relative("-1h")?),
        )
        .with_event_overlays([EventOverlay::new(EventSignal::new(
            format!("{APP} deploy*"),
            EventType::EventTimeSeries,
        )?)
        .with_event_line(true)]);
    let group = DashboardGroup::new()
        .with_name(format!("{APP} team"))?
        .with_dashboards([dashboard])?;

    let detector = Detector::new()
        .with_name(format!("{APP} CPU high"))?
        .from_chart(&cpu, |program| {
            let stream = program
                .statements()
                .first()
                .cloned()
                .ok_or_else(|| ValidationError::invalid("chart program is empty"))?;
            let signal = Assignment::new("A", stream)?;
            let alert = detect(when(gt(signal.reference(), 90))).publish("CPU high");
            Program::new([Expr::from(signal), Expr::from(alert)])
        })?
        .with_rules(vec![
            Rule::for_label("CPU high")?
                .with_severity(Severity::Major)
                .with_notifications(vec![Notification::email("oncall@example.com")?]),
        ])?;

    CliBuilder::new()
        .with_resource(group)
        .with_resource(detector)
        .run()
}
