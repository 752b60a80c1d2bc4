//! Poll cycles from scripted command output to gauge values

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use chassismon_core::chassis::{ChassisClient, ChassisSource};
use chassismon_core::metrics::{GaugeFamily, MemorySink};
use chassismon_core::parser::ParseContext;
use chassismon_core::poller::{Poller, PollerSettings};
use chassismon_core::session::SessionManager;

use super::fixtures::{FakeBmcs, SENSOR_INFO, Script, ScriptedConnector};

type TestPoller = Poller<ChassisClient<ScriptedConnector>, Arc<FakeBmcs>, MemorySink>;

async fn poller(script: &Script) -> (TestPoller, Arc<FakeBmcs>) {
    let session = Arc::new(SessionManager::new(ScriptedConnector(script.clone())));
    session.connect().await.unwrap();
    let client = ChassisClient::new(session, ParseContext::default());
    let bmcs = Arc::new(FakeBmcs::default());
    let poller = Poller::new(
        client,
        Arc::clone(&bmcs),
        Arc::new(MemorySink::new()),
        PollerSettings::default(),
    );
    (poller, bmcs)
}

fn blade(slot: &str) -> [&str; 4] {
    let name = match slot {
        "14" => "SLOT-14",
        "15" => "SLOT-15",
        _ => "SLOT-01",
    };
    [slot, name, "ON", "PowerEdgeM610"]
}

#[tokio::test]
async fn sensor_info_tables_parse_through_the_session() {
    let script = Script::new();
    let (poller, _) = poller(&script).await;

    // Scenario 1: the fixture's four tables keep their row counts
    let info = poller.chassis().sensor_info().await.unwrap();
    assert_eq!(info.fans.len(), 9);
    assert_eq!(info.ambient_temp.len(), 1);
    assert_eq!(info.power_supplies.len(), 6);
    assert_eq!(info.cables.len(), 2);
    assert_eq!(info.fans[2].reading, 4900);
    assert_eq!(info.ambient_temp[0].reading, 21);
}

#[tokio::test]
async fn full_cycle_publishes_every_family() {
    let script = Script::new();
    let (poller, bmcs) = poller(&script).await;

    let summary = poller.poll_once().await;
    assert_eq!(summary.sensors.published, 10);
    assert_eq!(summary.blades.published, 2);
    assert_eq!(summary.blades.skipped, 1);

    let sink = poller.sink();
    assert_eq!(sink.len(GaugeFamily::FanRpm), 9);
    assert_eq!(sink.get(GaugeFamily::FanRpm, &["3", "Fan-3", "OK"]), Some(4900.0));
    assert_eq!(
        sink.get(GaugeFamily::AmbientTemp, &["1", "Ambient_Temp", "OK"]),
        Some(21.0)
    );
    assert_eq!(sink.get(GaugeFamily::BladeTemp, &blade("14")), Some(34.0));
    assert_eq!(sink.get(GaugeFamily::BladeTemp, &blade("15")), Some(35.0));
    assert_eq!(bmcs.reads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn power_budget_keeps_only_allocation_rows() {
    let script = Script::new();
    let (poller, _) = poller(&script).await;

    // Scenario 2: status and supply sections contribute nothing
    let budget = poller.chassis().power_budget_info().await.unwrap();
    assert_eq!(budget.servers.len(), 3);
    assert_eq!(budget.servers[2].allocation, "300 W");
    assert_eq!(budget.servers[0].power_state, "OFF");
}

#[tokio::test]
async fn sensor_transport_failure_clears_chassis_gauges() {
    let script = Script::new();
    let (poller, _) = poller(&script).await;
    poller.poll_once().await;
    assert_eq!(poller.sink().len(GaugeFamily::FanRpm), 9);

    // Scenario 3
    script.fail("racadm getsensorinfo");
    let summary = poller.poll_once().await;
    assert!(summary.sensors.command_failed);
    assert_eq!(summary.sensors.published, 0);
    assert_eq!(poller.sink().len(GaugeFamily::FanRpm), 0);
    assert_eq!(poller.sink().len(GaugeFamily::AmbientTemp), 0);
    // The blade phase is independent
    assert_eq!(poller.sink().len(GaugeFamily::BladeTemp), 2);
}

#[tokio::test]
async fn malformed_sensor_output_clears_chassis_gauges() {
    let script = Script::new();
    let (poller, _) = poller(&script).await;
    poller.poll_once().await;

    script.set("racadm getsensorinfo", "FanSpeed 1 Fan-1 OK 4920 rpm\n");
    let summary = poller.poll_once().await;
    assert!(summary.sensors.command_failed);
    assert_eq!(poller.sink().len(GaugeFamily::FanRpm), 0);
}

#[tokio::test]
async fn blade_not_on_is_never_read() {
    let script = Script::new();
    script.set(
        "racadm getpbinfo",
        "[Server Module Power Allocation Table]
<Slot#> <Server Name>  <Power State>   <Allocation>    <Priority>  <Blade Type>
14      SLOT-14         OFF             0 W             1           PowerEdgeM610
15      SLOT-15         ON              300 W           1           PowerEdgeM610
",
    );
    let (poller, bmcs) = poller(&script).await;

    // Scenario 4
    let summary = poller.poll_once().await;
    assert_eq!(summary.blades.skipped, 1);
    assert_eq!(poller.sink().len(GaugeFamily::BladeTemp), 1);
    assert_eq!(
        poller
            .sink()
            .get(GaugeFamily::BladeTemp, &["14", "SLOT-14", "OFF", "PowerEdgeM610"]),
        None
    );
    assert_eq!(bmcs.reads.load(Ordering::SeqCst), 1);
    assert_eq!(script.calls("racadm getniccfg -m server-14"), 0);
}

#[tokio::test]
async fn unexpected_unit_only_drops_that_row() {
    let script = Script::new();
    let (poller, _) = poller(&script).await;
    poller.poll_once().await;

    script.set(
        "racadm getsensorinfo",
        "FanSpeed 1 Fan-1 OK 4920 rpm 1000 14500
FanSpeed 2 Fan-2 OK 4920 rpm 1000 14500
Temp 1 Ambient_Temp OK 70 Fahrenheit N/A 40
",
    );
    let summary = poller.poll_once().await;
    assert_eq!(summary.sensors.rejected, 1);
    assert_eq!(summary.sensors.published, 2);
    assert_eq!(poller.sink().len(GaugeFamily::AmbientTemp), 0);
    assert_eq!(poller.sink().get(GaugeFamily::FanRpm, &["2", "Fan-2", "OK"]), Some(4920.0));
}

#[tokio::test]
async fn blade_addresses_resolved_once() {
    let script = Script::new();
    let (poller, _) = poller(&script).await;

    poller.poll_once().await;
    poller.poll_once().await;
    poller.poll_once().await;

    assert_eq!(script.calls("racadm getniccfg -m server-14"), 1);
    assert_eq!(script.calls("racadm getniccfg -m server-15"), 1);
    assert_eq!(script.calls("racadm getpbinfo"), 3);
    assert_eq!(
        poller.addresses().get("SLOT-14"),
        Some("192.168.2.14".parse::<IpAddr>().unwrap())
    );
}

#[tokio::test]
async fn nic_lookup_failure_isolated_to_blade() {
    let script = Script::new();
    script.fail("racadm getniccfg -m server-14");
    let (poller, _) = poller(&script).await;

    let summary = poller.poll_once().await;
    assert_eq!(summary.blades.published, 1);
    assert_eq!(summary.blades.rejected, 1);
    assert_eq!(poller.sink().get(GaugeFamily::BladeTemp, &blade("14")), None);
    assert_eq!(poller.sink().get(GaugeFamily::BladeTemp, &blade("15")), Some(35.0));
    assert!(poller.addresses().get("SLOT-14").is_none());
}

#[tokio::test]
async fn unreachable_bmc_removes_previous_reading() {
    let script = Script::new();
    let (poller, bmcs) = poller(&script).await;
    poller.poll_once().await;
    assert_eq!(poller.sink().len(GaugeFamily::BladeTemp), 2);

    bmcs.unreachable
        .lock()
        .unwrap()
        .push("192.168.2.15".parse().unwrap());
    let summary = poller.poll_once().await;
    assert_eq!(summary.blades.rejected, 1);
    assert_eq!(poller.sink().get(GaugeFamily::BladeTemp, &blade("15")), None);
    assert_eq!(poller.sink().get(GaugeFamily::BladeTemp, &blade("14")), Some(34.0));
}

#[tokio::test]
async fn power_budget_failure_clears_blade_gauges() {
    let script = Script::new();
    let (poller, _) = poller(&script).await;
    poller.poll_once().await;

    script.fail("racadm getpbinfo");
    let summary = poller.poll_once().await;
    assert!(summary.blades.command_failed);
    assert_eq!(poller.sink().len(GaugeFamily::BladeTemp), 0);
    assert_eq!(poller.sink().len(GaugeFamily::FanRpm), 9);
}

#[tokio::test]
async fn status_change_replaces_the_old_series() {
    let script = Script::new();
    let (poller, _) = poller(&script).await;
    poller.poll_once().await;
    assert_eq!(poller.sink().get(GaugeFamily::FanRpm, &["3", "Fan-3", "OK"]), Some(4900.0));

    script.set(
        "racadm getsensorinfo",
        &SENSOR_INFO.replace(
            "FanSpeed        3       Fan-3           OK              4900",
            "FanSpeed        3       Fan-3           Critical        900 ",
        ),
    );
    let summary = poller.poll_once().await;
    assert_eq!(summary.sensors.published, 10);
    assert_eq!(summary.sensors.pruned, 1);

    let sink = poller.sink();
    assert_eq!(sink.get(GaugeFamily::FanRpm, &["3", "Fan-3", "OK"]), None);
    assert_eq!(
        sink.get(GaugeFamily::FanRpm, &["3", "Fan-3", "Critical"]),
        Some(900.0)
    );
    assert_eq!(sink.len(GaugeFamily::FanRpm), 9);

    // Steady state prunes nothing
    let summary = poller.poll_once().await;
    assert_eq!(summary.sensors.pruned, 0);
    assert_eq!(summary.blades.pruned, 0);
}

#[tokio::test]
async fn blade_leaving_the_table_is_dropped() {
    let script = Script::new();
    let (poller, _) = poller(&script).await;
    poller.poll_once().await;
    assert_eq!(poller.sink().len(GaugeFamily::BladeTemp), 2);

    script.set(
        "racadm getpbinfo",
        "[Server Module Power Allocation Table]
<Slot#> <Server Name>  <Power State>   <Allocation>    <Priority>  <Blade Type>
15      SLOT-15         ON              300 W           1           PowerEdgeM610
",
    );
    let summary = poller.poll_once().await;
    assert_eq!(summary.blades.pruned, 1);
    assert_eq!(poller.sink().get(GaugeFamily::BladeTemp, &blade("14")), None);
    assert_eq!(poller.sink().get(GaugeFamily::BladeTemp, &blade("15")), Some(35.0));
}
