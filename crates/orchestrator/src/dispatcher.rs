//! Probe planning per asset category

use vantage_common::{Asset, AssetCategory, ProbeKind, ProbeSpec};
use vantage_fingerprint::DATABASE_PORTS;
use vantage_target_resolver::TargetResolver;

/// Ports checked on hosts and workstations once they answer a ping.
pub const COMMON_PORTS: [u16; 21] = [
    21, 22, 23, 25, 53, 80, 110, 143, 443, 993, 995, 1433, 1521, 3306, 3389, 5432, 5984, 6379, 8080,
    8443, 9200,
];

/// Network devices: SNMP, SSH, telnet.
const DEVICE_PROBES: [(ProbeKind, u16); 3] = [
    (ProbeKind::TcpPort, 161),
    (ProbeKind::SshService, 22),
    (ProbeKind::TcpPort, 23),
];

/// Turns an asset into its ordered probe plan. Pure; no I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeDispatcher;

impl ProbeDispatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn plan(&self, asset: &Asset) -> Vec<ProbeSpec> {
        let target = TargetResolver::target_of(asset);
        let declared = asset.declared_port();
        let mut plan = Vec::new();

        match asset.category {
            AssetCategory::Host | AssetCategory::Workstation => {
                plan.push(ProbeSpec::ping(target.as_str()));
                for port in COMMON_PORTS {
                    plan.push(ProbeSpec::on_port(ProbeKind::TcpPort, target.as_str(), port).gated());
                }
                if let Some(port) = declared.filter(|p| !COMMON_PORTS.contains(p)) {
                    plan.push(ProbeSpec::on_port(ProbeKind::TcpPort, target.as_str(), port).gated());
                }
            }
            AssetCategory::WebApplication => {
                plan.push(ProbeSpec::on_port(ProbeKind::HttpService, target.as_str(), 80));
                plan.push(ProbeSpec::on_port(ProbeKind::HttpsService, target.as_str(), 443));
                if let Some(port) = declared.filter(|p| *p != 80 && *p != 443) {
                    let kind = if asset.prefers_https() {
                        ProbeKind::HttpsService
                    } else {
                        ProbeKind::HttpService
                    };
                    plan.push(ProbeSpec::on_port(kind, target.as_str(), port));
                }
            }
            AssetCategory::Database => {
                for port in DATABASE_PORTS {
                    plan.push(ProbeSpec::on_port(ProbeKind::DatabaseService, target.as_str(), port));
                }
                if let Some(port) = declared {
                    plan.push(ProbeSpec::on_port(ProbeKind::DatabaseService, target.as_str(), port));
                }
            }
            AssetCategory::NetworkDevice => {
                plan.push(ProbeSpec::ping(target.as_str()));
                for (kind, port) in DEVICE_PROBES {
                    plan.push(ProbeSpec::on_port(kind, target.as_str(), port));
                }
            }
            AssetCategory::Generic => {
                plan.push(ProbeSpec::ping(target.as_str()));
                if let Some(port) = declared {
                    plan.push(ProbeSpec::on_port(ProbeKind::TcpPort, target.as_str(), port));
                }
            }
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_and_ports(plan: &[ProbeSpec]) -> Vec<(ProbeKind, Option<u16>)> {
        plan.iter().map(|s| (s.kind, s.port)).collect()
    }

    #[test]
    fn host_pings_then_gates_common_ports() {
        let asset = Asset::new(1, "db-box", AssetCategory::Host).with_ip("10.0.0.5").with_port(8081);
        let plan = ProbeDispatcher::new().plan(&asset);

        assert_eq!(plan.len(), 1 + COMMON_PORTS.len() + 1);
        assert_eq!(plan[0].kind, ProbeKind::Ping);
        assert!(!plan[0].gated);
        assert!(plan[1..].iter().all(|s| s.gated && s.kind == ProbeKind::TcpPort));
        assert_eq!(plan.last().unwrap().port, Some(8081));
        assert!(plan.iter().all(|s| s.target == "10.0.0.5"));
    }

    #[test]
    fn host_declared_port_is_not_duplicated() {
        let asset = Asset::new(1, "ws", AssetCategory::Workstation).with_ip("10.0.0.6").with_port(3389);
        let plan = ProbeDispatcher::new().plan(&asset);
        assert_eq!(plan.len(), 1 + COMMON_PORTS.len());
    }

    #[test]
    fn web_application_plan() {
        let asset = Asset::new(2, "shop", AssetCategory::WebApplication).with_domain("shop.example");
        assert_eq!(
            kinds_and_ports(&ProbeDispatcher::new().plan(&asset)),
            vec![(ProbeKind::HttpService, Some(80)), (ProbeKind::HttpsService, Some(443))]
        );

        let plain = asset.clone().with_port(8080);
        assert_eq!(ProbeDispatcher::new().plan(&plain)[2].kind, ProbeKind::HttpService);

        let tls = asset.clone().with_port(8443).with_protocol("HTTPS");
        assert_eq!(
            kinds_and_ports(&ProbeDispatcher::new().plan(&tls))[2],
            (ProbeKind::HttpsService, Some(8443))
        );

        let default_port = asset.with_port(443);
        assert_eq!(ProbeDispatcher::new().plan(&default_port).len(), 2);
    }

    #[test]
    fn database_plan_keeps_declared_port() {
        let asset = Asset::new(3, "pg", AssetCategory::Database).with_ip("10.0.0.7").with_port(5433);
        let plan = ProbeDispatcher::new().plan(&asset);
        let ports: Vec<u16> = plan.iter().filter_map(|s| s.port).collect();
        assert_eq!(ports, vec![1433, 1521, 3306, 5432, 6379, 27017, 5433]);
        assert!(plan.iter().all(|s| s.kind == ProbeKind::DatabaseService && !s.gated));
    }

    #[test]
    fn network_device_plan() {
        let asset = Asset::new(4, "core-sw", AssetCategory::NetworkDevice).with_ip("10.0.0.1");
        assert_eq!(
            kinds_and_ports(&ProbeDispatcher::new().plan(&asset)),
            vec![
                (ProbeKind::Ping, None),
                (ProbeKind::TcpPort, Some(161)),
                (ProbeKind::SshService, Some(22)),
                (ProbeKind::TcpPort, Some(23)),
            ]
        );
    }

    #[test]
    fn generic_plan_uses_name_when_no_address() {
        let bare = Asset::new(5, "printer.lan", AssetCategory::Generic);
        let plan = ProbeDispatcher::new().plan(&bare);
        assert_eq!(kinds_and_ports(&plan), vec![(ProbeKind::Ping, None)]);
        assert_eq!(plan[0].target, "printer.lan");

        let with_port = bare.with_port(9100);
        assert_eq!(
            kinds_and_ports(&ProbeDispatcher::new().plan(&with_port)),
            vec![(ProbeKind::Ping, None), (ProbeKind::TcpPort, Some(9100))]
        );
    }
}
