use serde_json::Value;
use signalform::charts::Chart;
use signalform::dashboards::DashboardGroup;
use signalform::flow::{Program, data};
use signalform::transport::Method;
use signalform::{ActionFlags, Client, Dashboard, MemoryTransport, Overrides};

fn chart(name: &str, metric: &str) -> Chart {
    Chart::time_series()
        .with_name(name)
        .unwrap()
        .with_program(Program::new([data(metric).publish("A")]).unwrap())
        .unwrap()
}

fn dashboard(name: &str, chart_name: &str) -> Dashboard {
    Dashboard::new()
        .with_name(name)
        .unwrap()
        .with_charts([chart(chart_name, "cpu")])
        .unwrap()
}

fn group(name: &str, dashboards: Vec<Dashboard>) -> DashboardGroup {
    DashboardGroup::new()
        .with_name(name)
        .unwrap()
        .with_dashboards(dashboards)
        .unwrap()
}

fn team() -> DashboardGroup {
    group(
        "Team",
        vec![dashboard("Ops", "CPU"), dashboard("Billing", "Cost")],
    )
}

fn setup() -> (MemoryTransport, Client) {
    let api = MemoryTransport::new();
    let client = Client::new(api.clone(), "token").unwrap();
    (api, client)
}

fn find_group(api: &MemoryTransport, name: &str) -> Value {
    api.entities("dashboardgroup")
        .into_iter()
        .find(|group| group["name"] == name)
        .unwrap()
}

fn member_names(api: &MemoryTransport, group: &Value) -> Vec<String> {
    group["dashboards"]
        .as_array()
        .unwrap()
        .iter()
        .map(|id| {
            let dashboard = api.entity("dashboard", id.as_str().unwrap()).unwrap();
            dashboard["name"].as_str().unwrap().to_string()
        })
        .collect()
}

#[test]
fn create_moves_dashboards_into_the_group() {
    let (api, client) = setup();

    let created = client.create(&team(), ActionFlags::default()).unwrap();

    let groups = api.entities("dashboardgroup");
    assert_eq!(groups.len(), 1);
    assert_eq!(created, groups[0]);
    assert_eq!(member_names(&api, &created), ["Ops", "Billing"]);

    let dashboards = api.entities("dashboard");
    assert_eq!(dashboards.len(), 2);
    assert!(dashboards.iter().all(|d| d["groupId"] == created["id"]));
    assert_eq!(api.entities("chart").len(), 2);
}

#[test]
fn create_without_dashboards_keeps_the_default_one() {
    let (api, client) = setup();

    let created = client
        .create(
            &DashboardGroup::new().with_name("Empty").unwrap(),
            ActionFlags::default(),
        )
        .unwrap();

    assert_eq!(created["dashboards"].as_array().unwrap().len(), 1);
    assert_eq!(api.entities("dashboard").len(), 1);
    assert_eq!(api.count(Method::Post, "/dashboard/simple"), 0);
}

#[test]
fn repeated_updates_converge() {
    let (api, client) = setup();
    client.create(&team(), ActionFlags::default()).unwrap();
    let first = find_group(&api, "Team");
    api.clear_requests();

    client
        .update(&team(), &Overrides::default(), ActionFlags::default())
        .unwrap();

    assert_eq!(find_group(&api, "Team"), first);
    assert_eq!(api.count(Method::Post, "/dashboard"), 0);
    assert_eq!(api.count(Method::Delete, "/dashboard"), 0);
    assert_eq!(api.entities("dashboard").len(), 2);
    assert_eq!(api.entities("chart").len(), 2);
}

#[test]
fn update_removes_undeclared_dashboards() {
    let (api, client) = setup();
    client.create(&team(), ActionFlags::default()).unwrap();

    client
        .update(
            &group("Team", vec![dashboard("Ops", "CPU")]).with_description("on-call"),
            &Overrides::default(),
            ActionFlags::default(),
        )
        .unwrap();

    let remote = find_group(&api, "Team");
    assert_eq!(member_names(&api, &remote), ["Ops"]);
    assert_eq!(remote["description"], "on-call");
    assert_eq!(api.entities("dashboard").len(), 1);
    assert_eq!(api.entities("chart").len(), 1);
}

#[test]
fn update_creates_a_missing_group() {
    let (api, client) = setup();

    client
        .update(&team(), &Overrides::default(), ActionFlags::default())
        .unwrap();

    assert_eq!(member_names(&api, &find_group(&api, "Team")), ["Ops", "Billing"]);
    assert_eq!(api.entities("dashboardgroup").len(), 1);
}

#[test]
fn standalone_dashboard_is_moved_and_its_group_retired() {
    let (api, client) = setup();
    client
        .create(&dashboard("Ops", "CPU"), ActionFlags::default())
        .unwrap();
    assert_eq!(api.entities("dashboardgroup").len(), 1);

    client
        .create(&group("Team", vec![dashboard("Ops", "CPU")]), ActionFlags::default())
        .unwrap();

    let groups = api.entities("dashboardgroup");
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["name"], "Team");
    assert_eq!(api.entities("dashboard").len(), 1);
    assert_eq!(api.entities("chart").len(), 1);
}

#[test]
fn source_group_with_other_dashboards_survives() {
    let (api, client) = setup();
    client
        .create(
            &group("Shared", vec![dashboard("Ops", "CPU"), dashboard("Misc", "Load")]),
            ActionFlags::default(),
        )
        .unwrap();

    client
        .create(&group("Team", vec![dashboard("Ops", "CPU")]), ActionFlags::default())
        .unwrap();

    assert_eq!(member_names(&api, &find_group(&api, "Shared")), ["Misc"]);
    assert_eq!(member_names(&api, &find_group(&api, "Team")), ["Ops"]);
    assert_eq!(api.entities("dashboard").len(), 2);
    assert_eq!(api.entities("chart").len(), 2);
}

#[test]
fn delete_removes_dashboards_and_charts() {
    let (api, client) = setup();
    client.create(&team(), ActionFlags::default()).unwrap();

    client
        .delete(&group("Team", Vec::new()), ActionFlags::default())
        .unwrap();

    assert!(api.entities("dashboardgroup").is_empty());
    assert!(api.entities("dashboard").is_empty());
    assert!(api.entities("chart").is_empty());
}

#[test]
fn dry_run_create_returns_the_nested_payload() {
    let (api, client) = setup();

    let payload = client.create(&team(), ActionFlags::dry_run()).unwrap();

    assert_eq!(payload["name"], "Team");
    assert_eq!(payload["dashboards"][0]["name"], "Ops");
    assert_eq!(payload["dashboards"][0]["charts"][0]["name"], "CPU");
    assert!(api.requests().is_empty());
}
