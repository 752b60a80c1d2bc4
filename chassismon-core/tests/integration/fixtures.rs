//! Scripted chassis, transports and BMCs shared by the integration tests

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chassismon_core::session::{Connector, Transport, TransportError, TransportResult};
use chassismon_core::sideband::{SidebandError, SidebandResult, SidebandSensors};

pub const SENSOR_INFO: &str = "
<senType>       <Num>   <sensorName>    <status>        <reading>       <units>         <LC>    <UC>
FanSpeed        1       Fan-1           OK              4920            rpm             1000    14500
FanSpeed        2       Fan-2           OK              4920            rpm             1000    14500
FanSpeed        3       Fan-3           OK              4900            rpm             2000    14500
FanSpeed        4       Fan-4           OK              4920            rpm             1000    14500
FanSpeed        5       Fan-5           OK              4914            rpm             1000    14500
FanSpeed        6       Fan-6           OK              4920            rpm             2000    14500
FanSpeed        7       Fan-7           OK              4900            rpm             2000    9835
FanSpeed        8       Fan-8           OK              4920            rpm             1000    14500
FanSpeed        9       Fan-9           OK              4914            rpm             2000    14500

<senType>       <Num>   <sensorName>    <status>        <reading>       <units>         <LC>    <UC>
Temp            1       Ambient_Temp    OK              21              Celsius         N/A     40

<senType>       <Num>   <sensorName>    <status>        <health>
PWR             1       PS-1            Online          OK
PWR             2       PS-2            Online          OK
PWR             3       PS-3            Online          OK
PWR             4       PS-4            Online          OK
PWR             5       PS-5            Online          OK
PWR             6       PS-6            Online          OK

<senType>       <Num>   <sensorName>    <status>
Cable           1       IO-Cable        OK
Cable           2       FPC-Cable       OK
";

pub const POWER_BUDGET: &str = "
[Power Budget Status]
System Input Power                              = 2345 W
Peak System Power                               = 3456 W
Overall Power Health                            = OK

[Chassis Power Supply Status Table]
<Name>          <Model>         <Power State>          <Input Current> <Input Volts>   <Output Rated Power>
PS1             111111          Online                 1.3 A                  239.1 V                2360 W

[Server Module Power Allocation Table]
<Slot#> <Server Name>  <Power State>   <Allocation>    <Priority>  <Blade Type>
1       SLOT-01         OFF             0 W             1           PowerEdgeM610
14      SLOT-14         ON              323 W           1           PowerEdgeM610
15      SLOT-15         ON              300 W           1           PowerEdgeM610
";

/// `getniccfg` output for a blade at `ip`
pub fn nic_config(ip: &str) -> String {
    format!(
        "LOM Model Name            = Embedded LOM
IPv4 Enabled              = 1
DHCP Enabled              = 0
IP Address                = {ip}
Subnet Mask               = 255.255.255.0
Gateway                   = 192.168.2.1
"
    )
}

/// Outputs keyed by command, editable between cycles
#[derive(Clone, Default)]
pub struct Script {
    outputs: Arc<Mutex<HashMap<String, Result<String, TransportError>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl Script {
    pub fn new() -> Self {
        let script = Self::default();
        script.set("racadm getsensorinfo", SENSOR_INFO);
        script.set("racadm getpbinfo", POWER_BUDGET);
        script.set("racadm getniccfg -m server-14", &nic_config("192.168.2.14"));
        script.set("racadm getniccfg -m server-15", &nic_config("192.168.2.15"));
        script
    }

    pub fn set(&self, command: &str, output: &str) {
        self.outputs
            .lock()
            .unwrap()
            .insert(command.to_string(), Ok(output.to_string()));
    }

    pub fn fail(&self, command: &str) {
        self.outputs.lock().unwrap().insert(
            command.to_string(),
            Err(TransportError::Exec {
                command: command.to_string(),
                reason: "connection reset by peer".into(),
            }),
        );
    }

    /// How many times `command` ran
    pub fn calls(&self, command: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == command)
            .count()
    }
}

pub struct ScriptedTransport {
    script: Script,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn exec(&self, command: &str) -> TransportResult<Vec<u8>> {
        self.script.calls.lock().unwrap().push(command.to_string());
        let output = self.script.outputs.lock().unwrap().get(command).cloned();
        match output {
            Some(Ok(text)) => Ok(text.into_bytes()),
            Some(Err(e)) => Err(e),
            None => Err(TransportError::ExitStatus {
                command: command.to_string(),
                status: "exit status: 1".into(),
                stderr: "ERROR: Invalid subcommand".into(),
            }),
        }
    }

    async fn close(&self) -> TransportResult<()> {
        Ok(())
    }
}

pub struct ScriptedConnector(pub Script);

#[async_trait]
impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    async fn connect(&self) -> TransportResult<ScriptedTransport> {
        Ok(ScriptedTransport {
            script: self.0.clone(),
        })
    }

    fn target(&self) -> String {
        "root@cmc.test:22".into()
    }
}

/// BMCs that report `20 + last octet` degrees, except the listed addresses
#[derive(Default)]
pub struct FakeBmcs {
    pub unreachable: Mutex<Vec<IpAddr>>,
    pub reads: AtomicUsize,
}

#[async_trait]
impl SidebandSensors for FakeBmcs {
    async fn ambient_temperature(&self, addr: IpAddr, port: u16) -> SidebandResult<f64> {
        assert_eq!(port, 623);
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.lock().unwrap().contains(&addr) {
            return Err(SidebandError::Timeout { addr, secs: 15 });
        }
        match addr {
            IpAddr::V4(v4) => Ok(20.0 + f64::from(v4.octets()[3])),
            IpAddr::V6(_) => Ok(20.0),
        }
    }
}

/// Transport whose commands take `delay` and notice being closed under them
pub struct SlowTransport {
    pub id: usize,
    delay: Duration,
    closed: AtomicBool,
    in_flight: AtomicUsize,
    violations: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for SlowTransport {
    async fn exec(&self, command: &str) -> TransportResult<Vec<u8>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let torn_down = self.closed.load(Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if torn_down {
            self.violations.fetch_add(1, Ordering::SeqCst);
            return Err(TransportError::Exec {
                command: command.to_string(),
                reason: "transport closed mid-command".into(),
            });
        }
        Ok(format!("{}:{command}", self.id).into_bytes())
    }

    async fn close(&self) -> TransportResult<()> {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out [`SlowTransport`]s numbered from 1; fails once `fail_after`
/// transports exist
pub struct SlowConnector {
    delay: Duration,
    opened: AtomicUsize,
    fail_after: Option<usize>,
    pub violations: Arc<AtomicUsize>,
}

impl SlowConnector {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            opened: AtomicUsize::new(0),
            fail_after: None,
            violations: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }
}

#[async_trait]
impl Connector for SlowConnector {
    type Transport = SlowTransport;

    async fn connect(&self) -> TransportResult<SlowTransport> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let opened = self.opened.load(Ordering::SeqCst);
        if self.fail_after.is_some_and(|limit| opened >= limit) {
            return Err(TransportError::Connect {
                target: self.target(),
                reason: "authentication failed".into(),
            });
        }
        let id = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SlowTransport {
            id,
            delay: self.delay,
            closed: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            violations: Arc::clone(&self.violations),
        })
    }

    fn target(&self) -> String {
        "root@slow.test:22".into()
    }
}

pub fn text(out: &[u8]) -> Result<String, TransportError> {
    Ok(String::from_utf8_lossy(out).into_owned())
}
