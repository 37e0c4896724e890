//! Chart resources
//!
//! A [`Chart`] carries its rendered SignalFlow program under `programText`
//! and visualization settings under `options`. Setters that only make sense
//! for some chart kinds reject the others.

use serde_json::{Map, Value, json};

use crate::error::{ValidationError, ValidationResult};
use crate::flow::Program;
use crate::resources::{Resource, Syncable};

/// Collection endpoint for charts.
pub const CHART_ENDPOINT: &str = "/chart";

/// Visualization kind, sent as `options.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartType {
    /// Lines, areas or columns over time
    TimeSeries,
    /// Single big number
    SingleValue,
    /// Sorted list of values
    List,
    /// Grid of colored cells
    Heatmap,
    /// Markdown text
    Text,
}

impl ChartType {
    /// API name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartType::TimeSeries => "TimeSeriesChart",
            ChartType::SingleValue => "SingleValue",
            ChartType::List => "List",
            ChartType::Heatmap => "Heatmap",
            ChartType::Text => "Text",
        }
    }
}

macro_rules! api_enum {
    ($(#[$doc:meta])* $name:ident { $($(#[$vdoc:meta])* $variant:ident => $value:literal,)* }) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($(#[$vdoc])* $variant,)*
        }

        impl $name {
            /// Value sent to the API.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value,)*
                }
            }
        }
    };
}

api_enum!(
    /// Default plot style of a time series chart.
    PlotType {
        /// Lines
        Line => "LineChart",
        /// Filled areas
        Area => "AreaChart",
        /// Columns
        Column => "ColumnChart",
        /// Histogram
        Histogram => "Histogram",
    }
);

api_enum!(
    /// How series are colored.
    ColorBy {
        /// By dimension value
        Dimension => "Dimension",
        /// By metric
        Metric => "Metric",
        /// By color scale
        Scale => "Scale",
    }
);

api_enum!(
    /// Ordering of list charts.
    SortBy {
        /// Largest first
        ValueDesc => "-value",
        /// Smallest first
        ValueAsc => "+value",
    }
);

api_enum!(
    /// Prefix used when abbreviating values.
    UnitPrefix {
        /// k, M, G
        Metric => "Metric",
        /// Ki, Mi, Gi
        Binary => "Binary",
    }
);

/// Palette entries, sent by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum PaletteColor {
    Gray = 0,
    NavyBlue,
    SkyBlue,
    Shakespeare,
    Rust,
    Tangerine,
    Sunflower,
    Mulberry,
    HotPink,
    Rose,
    SlateBlue,
    Violet,
    Plum,
    Green,
    LightGreen,
    MountainGreen,
}

/// Time window shown by a visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeConfig {
    /// The last `range_ms` milliseconds.
    Relative {
        /// Width of the window
        range_ms: u64,
    },
    /// A fixed window in epoch milliseconds.
    Absolute {
        /// Window start
        start_ms: u64,
        /// Window end
        end_ms: u64,
    },
}

impl TimeConfig {
    /// Relative window. The range must be positive.
    pub fn relative(range_ms: u64) -> ValidationResult<Self> {
        if range_ms == 0 {
            return Err(ValidationError::invalid("relative time range must be positive"));
        }
        Ok(TimeConfig::Relative { range_ms })
    }

    /// Absolute window. `start_ms` must precede `end_ms`.
    pub fn absolute(start_ms: u64, end_ms: u64) -> ValidationResult<Self> {
        if start_ms >= end_ms {
            return Err(ValidationError::invalid(format!(
                "time window start {start_ms} must precede end {end_ms}"
            )));
        }
        Ok(TimeConfig::Absolute { start_ms, end_ms })
    }

    /// API representation.
    pub fn to_value(&self) -> Value {
        match self {
            TimeConfig::Relative { range_ms } => json!({"type": "relative", "range": range_ms}),
            TimeConfig::Absolute { start_ms, end_ms } => {
                json!({"type": "absolute", "start": start_ms, "end": end_ms})
            }
        }
    }
}

/// Y-axis bounds, label and watermarks.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisOption {
    min: f64,
    max: f64,
    label: String,
    high_watermark: f64,
    low_watermark: f64,
}

impl AxisOption {
    /// Describe an axis. `max` may not be below `min`.
    pub fn new(
        min: f64,
        max: f64,
        label: impl Into<String>,
        high_watermark: f64,
        low_watermark: f64,
    ) -> ValidationResult<Self> {
        let label = label.into();
        if max < min {
            return Err(ValidationError::invalid(format!(
                "axis '{label}' has max {max} below min {min}"
            )));
        }
        Ok(Self {
            min,
            max,
            label,
            high_watermark,
            low_watermark,
        })
    }

    fn to_value(&self) -> Value {
        json!({
            "min": self.min,
            "max": self.max,
            "label": self.label,
            "highWatermark": self.high_watermark,
            "lowWatermark": self.low_watermark,
        })
    }
}

/// Legend column toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOption {
    property: String,
    enabled: bool,
}

impl FieldOption {
    /// Show or hide `property` in the legend.
    pub fn new(property: impl Into<String>, enabled: bool) -> ValidationResult<Self> {
        let property = property.into();
        if property.trim().is_empty() {
            return Err(ValidationError::invalid("field option property cannot be empty"));
        }
        Ok(Self { property, enabled })
    }

    fn to_value(&self) -> Value {
        json!({"property": self.property, "enabled": self.enabled})
    }
}

/// Per-publish-label plot settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishLabelOptions {
    label: String,
    y_axis: u8,
    palette: PaletteColor,
    plot_type: PlotType,
    display_name: String,
}

impl PublishLabelOptions {
    /// Settings for the stream published as `label`. `y_axis` is 0 (left) or
    /// 1 (right).
    pub fn new(
        label: impl Into<String>,
        y_axis: u8,
        palette: PaletteColor,
        plot_type: PlotType,
        display_name: impl Into<String>,
    ) -> ValidationResult<Self> {
        let label = label.into();
        let display_name = display_name.into();
        if label.trim().is_empty() || display_name.trim().is_empty() {
            return Err(ValidationError::invalid(
                "publish label options need a label and a display name",
            ));
        }
        if y_axis > 1 {
            return Err(ValidationError::invalid(format!(
                "y axis must be 0 (left) or 1 (right); got {y_axis}"
            )));
        }
        Ok(Self {
            label,
            y_axis,
            palette,
            plot_type,
            display_name,
        })
    }

    fn to_value(&self) -> Value {
        json!({
            "label": self.label,
            "yAxis": self.y_axis,
            "paletteIndex": self.palette as u8,
            "plotType": self.plot_type.as_str(),
            "displayName": self.display_name,
        })
    }
}

/// A chart in SignalFx.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    resource: Resource,
    chart_type: ChartType,
    chart_options: Map<String, Value>,
    program: Option<Program>,
}

impl Chart {
    /// Empty chart of the given kind.
    pub fn new(chart_type: ChartType) -> Self {
        let mut chart_options = Map::new();
        chart_options.insert("type".into(), Value::String(chart_type.as_str().into()));
        Self {
            resource: Resource::new(CHART_ENDPOINT),
            chart_type,
            chart_options,
            program: None,
        }
    }

    /// Time series chart.
    pub fn time_series() -> Self {
        Self::new(ChartType::TimeSeries)
    }

    /// Single value chart.
    pub fn single_value() -> Self {
        Self::new(ChartType::SingleValue)
    }

    /// List chart.
    pub fn list() -> Self {
        Self::new(ChartType::List)
    }

    /// Heatmap chart.
    pub fn heatmap() -> Self {
        Self::new(ChartType::Heatmap)
    }

    /// Markdown text chart.
    pub fn text() -> Self {
        Self::new(ChartType::Text)
    }

    /// Kind of this chart.
    pub fn chart_type(&self) -> ChartType {
        self.chart_type
    }

    /// Program attached with [`Chart::with_program`].
    pub fn program(&self) -> Option<&Program> {
        self.program.as_ref()
    }

    /// Chart name.
    pub fn name(&self) -> Option<&str> {
        self.resource.name()
    }

    /// Set the chart name.
    pub fn with_name(mut self, name: impl Into<String>) -> ValidationResult<Self> {
        self.resource.set_name(name)?;
        Ok(self)
    }

    /// Set the chart description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.resource.set_description(description);
        self
    }

    /// Pin the remote id.
    pub fn with_id(mut self, id: impl Into<String>) -> ValidationResult<Self> {
        self.resource.set_id(id)?;
        Ok(self)
    }

    /// Attach a validated program; its text becomes `programText`.
    pub fn with_program(mut self, program: Program) -> ValidationResult<Self> {
        program.validate()?;
        self.resource
            .set_option("programText", Value::String(program.to_string()));
        self.program = Some(program);
        Ok(self)
    }

    fn require(&self, allowed: &[ChartType], setting: &str) -> ValidationResult<()> {
        if allowed.contains(&self.chart_type) {
            Ok(())
        } else {
            Err(ValidationError::invalid(format!(
                "'{setting}' does not apply to {} charts",
                self.chart_type.as_str()
            )))
        }
    }

    fn set(mut self, key: &str, value: Value) -> Self {
        self.chart_options.insert(key.into(), value);
        self
    }

    fn set_for(self, allowed: &[ChartType], key: &str, value: Value) -> ValidationResult<Self> {
        self.require(allowed, key)?;
        Ok(self.set(key, value))
    }

    /// Color series by dimension, metric or scale.
    pub fn with_color_by(self, color_by: ColorBy) -> ValidationResult<Self> {
        self.set_for(
            &[ChartType::TimeSeries, ChartType::SingleValue, ChartType::List, ChartType::Heatmap],
            "colorBy",
            json!(color_by.as_str()),
        )
    }

    /// Ordering of values.
    pub fn with_sort_by(self, sort_by: SortBy) -> ValidationResult<Self> {
        self.set_for(
            &[ChartType::TimeSeries, ChartType::SingleValue, ChartType::List, ChartType::Heatmap],
            "sortBy",
            json!(sort_by.as_str()),
        )
    }

    /// Abbreviation prefix for values.
    pub fn with_unit_prefix(self, prefix: UnitPrefix) -> ValidationResult<Self> {
        self.set_for(
            &[ChartType::TimeSeries, ChartType::SingleValue, ChartType::List, ChartType::Heatmap],
            "unitPrefix",
            json!(prefix.as_str()),
        )
    }

    /// How the underlying program runs: minimum resolution and maximum delay
    /// in milliseconds, optionally without sampling.
    pub fn with_program_options(
        self,
        min_resolution_ms: u64,
        max_delay_ms: u64,
        disable_sampling: bool,
    ) -> ValidationResult<Self> {
        self.set_for(
            &[ChartType::TimeSeries, ChartType::SingleValue, ChartType::List, ChartType::Heatmap],
            "programOptions",
            json!({
                "minimumResolution": min_resolution_ms,
                "maxDelay": max_delay_ms,
                "disableSampling": disable_sampling,
            }),
        )
    }

    /// Plot settings per publish label.
    pub fn with_publish_label_options(
        self,
        options: Vec<PublishLabelOptions>,
    ) -> ValidationResult<Self> {
        if options.is_empty() {
            return Err(ValidationError::invalid("no publish label options given"));
        }
        let values = options.iter().map(PublishLabelOptions::to_value).collect();
        self.set_for(
            &[ChartType::TimeSeries, ChartType::SingleValue, ChartType::List, ChartType::Heatmap],
            "publishLabelOptions",
            Value::Array(values),
        )
    }

    /// Visible time window.
    pub fn with_time(self, time: TimeConfig) -> ValidationResult<Self> {
        self.set_for(&[ChartType::TimeSeries], "time", time.to_value())
    }

    /// Left and right y-axes.
    pub fn with_axes(self, axes: Vec<AxisOption>) -> ValidationResult<Self> {
        if axes.is_empty() || axes.len() > 2 {
            return Err(ValidationError::invalid("a chart has one or two y axes"));
        }
        let values = axes.iter().map(AxisOption::to_value).collect();
        self.set_for(&[ChartType::TimeSeries], "axes", Value::Array(values))
    }

    /// Legend columns.
    pub fn with_legend_fields(self, fields: Vec<FieldOption>) -> ValidationResult<Self> {
        let values: Vec<Value> = fields.iter().map(FieldOption::to_value).collect();
        self.set_for(
            &[ChartType::TimeSeries],
            "legendOptions",
            json!({"fields": values}),
        )
    }

    /// On-chart legend keyed by `dimension`.
    pub fn with_chart_legend(
        self,
        dimension: impl Into<String>,
        show_legend: bool,
    ) -> ValidationResult<Self> {
        let dimension = dimension.into();
        if dimension.trim().is_empty() {
            return Err(ValidationError::invalid("legend dimension cannot be empty"));
        }
        self.set_for(
            &[ChartType::TimeSeries],
            "onChartLegendOptions",
            json!({"showLegend": show_legend, "dimensionInLegend": dimension}),
        )
    }

    /// Default plot style.
    pub fn with_default_plot_type(self, plot_type: PlotType) -> ValidationResult<Self> {
        self.set_for(
            &[ChartType::TimeSeries],
            "defaultPlotType",
            json!(plot_type.as_str()),
        )
    }

    /// Data marker visibility for line or area plots; the default plot type
    /// must already be line or area.
    pub fn with_data_markers(self, show: bool) -> ValidationResult<Self> {
        let key = match self.chart_options.get("defaultPlotType").and_then(Value::as_str) {
            Some("LineChart") => "lineChartOptions",
            Some("AreaChart") => "areaChartOptions",
            other => {
                return Err(ValidationError::invalid(format!(
                    "data markers need a line or area plot type, chart has {}",
                    other.unwrap_or("none")
                )));
            }
        };
        self.set_for(&[ChartType::TimeSeries], key, json!({"showDataMarkers": show}))
    }

    /// Stack area and column plots.
    pub fn stacked(self, stacked: bool) -> ValidationResult<Self> {
        self.set_for(&[ChartType::TimeSeries], "stacked", json!(stacked))
    }

    /// Draw event lines.
    pub fn show_event_lines(self, show: bool) -> ValidationResult<Self> {
        self.set_for(&[ChartType::TimeSeries], "showEventLines", json!(show))
    }

    /// Fixed number of significant digits on the y-axis.
    pub fn with_axis_precision(self, digits: u8) -> ValidationResult<Self> {
        self.set_for(&[ChartType::TimeSeries], "axisPrecision", json!(digits))
    }

    /// Refresh period in milliseconds.
    pub fn with_refresh_interval(self, interval_ms: u64) -> ValidationResult<Self> {
        self.set_for(
            &[ChartType::SingleValue, ChartType::List],
            "refreshInterval",
            json!(interval_ms),
        )
    }

    /// Maximum digits shown.
    pub fn with_maximum_precision(self, digits: u8) -> ValidationResult<Self> {
        self.set_for(
            &[ChartType::SingleValue, ChartType::List],
            "maximumPrecision",
            json!(digits),
        )
    }

    /// Hide the timestamp.
    pub fn with_timestamp_hidden(self, hidden: bool) -> ValidationResult<Self> {
        self.set_for(&[ChartType::SingleValue], "timestampHidden", json!(hidden))
    }

    /// Show a sparkline under the value.
    pub fn with_sparkline(self, show: bool) -> ValidationResult<Self> {
        self.set_for(&[ChartType::SingleValue], "showSparkLine", json!(show))
    }

    /// Color thresholds, sent highest first. `inverted` applies to single
    /// value charts only.
    pub fn with_color_scale(
        self,
        mut thresholds: Vec<f64>,
        inverted: bool,
    ) -> ValidationResult<Self> {
        if thresholds.is_empty() {
            return Err(ValidationError::invalid("color scale needs at least one threshold"));
        }
        thresholds.sort_by(|a, b| b.total_cmp(a));
        let value = match self.chart_type {
            ChartType::Heatmap => json!({"thresholds": thresholds}),
            _ => json!({"thresholds": thresholds, "inverted": inverted}),
        };
        self.set_for(&[ChartType::SingleValue, ChartType::Heatmap], "colorScale", value)
    }

    /// Markdown body of a text chart.
    pub fn with_markdown(self, markdown: impl Into<String>) -> ValidationResult<Self> {
        self.set_for(&[ChartType::Text], "markdown", Value::String(markdown.into()))
    }
}

impl Syncable for Chart {
    fn resource(&self) -> &Resource {
        &self.resource
    }

    fn payload(&self) -> Value {
        let mut payload = self.resource.options().clone();
        let mut options = payload
            .remove("options")
            .and_then(|value| match value {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .unwrap_or_default();
        options.extend(self.chart_options.clone());
        payload.insert("options".into(), Value::Object(options));
        Value::Object(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{Aggregation, data, filter};

    fn cpu_program() -> Program {
        Program::new([data("cpu.utilization")
            .kwarg("filter", filter("app", "shoeadmin"))
            .mean(Aggregation::all())
            .publish("A")])
        .unwrap()
    }

    #[test]
    fn payload_carries_program_text_and_type() {
        let chart = Chart::time_series()
            .with_name("CPU")
            .unwrap()
            .with_program(cpu_program())
            .unwrap()
            .with_default_plot_type(PlotType::Area)
            .unwrap();

        assert_eq!(
            chart.payload(),
            json!({
                "name": "CPU",
                "programText": "data(\"cpu.utilization\",filter=filter(\"app\",\"shoeadmin\")).mean().publish(label=\"A\")",
                "options": {"type": "TimeSeriesChart", "defaultPlotType": "AreaChart"},
            })
        );
        assert_eq!(chart.program(), Some(&cpu_program()));
    }

    #[test]
    fn programs_must_publish() {
        let silent = Program::new([data("cpu.utilization")]).unwrap();
        assert_eq!(
            Chart::time_series().with_program(silent).unwrap_err(),
            ValidationError::ProgramDoesNotPublish
        );
    }

    #[test]
    fn kind_specific_setters_reject_other_kinds() {
        assert!(Chart::list().with_axis_precision(2).is_err());
        assert!(Chart::time_series().with_refresh_interval(1000).is_err());
        assert!(Chart::text().with_color_by(ColorBy::Metric).is_err());
        assert!(Chart::list().with_refresh_interval(1000).is_ok());
        assert!(Chart::text().with_markdown("# hi").is_ok());
    }

    #[test]
    fn data_markers_follow_plot_type() {
        assert!(Chart::time_series().with_data_markers(true).is_err());

        let chart = Chart::time_series()
            .with_default_plot_type(PlotType::Line)
            .unwrap()
            .with_data_markers(true)
            .unwrap();
        assert_eq!(
            chart.payload()["options"]["lineChartOptions"],
            json!({"showDataMarkers": true})
        );
    }

    #[test]
    fn color_scale_thresholds_sort_descending() {
        let chart = Chart::single_value()
            .with_color_scale(vec![10.0, 90.0, 50.0], true)
            .unwrap();
        assert_eq!(
            chart.payload()["options"]["colorScale"],
            json!({"thresholds": [90.0, 50.0, 10.0], "inverted": true})
        );

        let heatmap = Chart::heatmap().with_color_scale(vec![1.0, 2.0], true).unwrap();
        assert_eq!(
            heatmap.payload()["options"]["colorScale"],
            json!({"thresholds": [2.0, 1.0]})
        );
    }

    #[test]
    fn option_value_constructors_validate() {
        assert!(AxisOption::new(10.0, 0.0, "pct", 90.0, 10.0).is_err());
        assert!(FieldOption::new("", true).is_err());
        assert!(
            PublishLabelOptions::new("A", 2, PaletteColor::Rust, PlotType::Line, "cpu").is_err()
        );
        assert!(TimeConfig::relative(0).is_err());
        assert!(TimeConfig::absolute(5, 5).is_err());

        let chart = Chart::time_series()
            .with_axes(vec![AxisOption::new(0.0, 100.0, "pct", 90.0, 10.0).unwrap()])
            .unwrap()
            .with_publish_label_options(vec![
                PublishLabelOptions::new("A", 1, PaletteColor::Rust, PlotType::Column, "cpu")
                    .unwrap(),
            ])
            .unwrap()
            .with_time(TimeConfig::relative(3_600_000).unwrap())
            .unwrap();
        let options = &chart.payload()["options"];
        assert_eq!(options["axes"][0]["highWatermark"], json!(90.0));
        assert_eq!(options["publishLabelOptions"][0]["paletteIndex"], json!(4));
        assert_eq!(options["time"], json!({"type": "relative", "range": 3_600_000}));
    }
}
