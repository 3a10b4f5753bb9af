//! Command handlers.
//!
//! Each handler validates its arguments, asks for confirmation where the
//! command is destructive, and turns the lifecycle outcome into a
//! [`Rendered`] result.

use docknet_control::{
    ControlError, DestroyOutcome, DestroyReport, EnsureOutcome, MachineId, NetworkLifecycle,
    NetworkName, NetworkSpec, OperationResult, PruneReport, RenameReport,
};
use docknet_core::Driver;
use serde_json::json;

use crate::output::{self, join_or_dash, OutputOptions, Rendered};
use crate::{Command, DownArgs, UpArgs};

type Outcome = Result<Rendered, ControlError>;

/// Run one daemon-backed command.
pub async fn execute<L>(
    service: &L,
    output: &OutputOptions,
    command: Command,
    with_containers: bool,
) -> Rendered
where
    L: NetworkLifecycle + ?Sized,
{
    let action = command.action();
    let outcome = match command {
        Command::Init { name, subnet } => init(service, &name, &subnet).await,
        Command::Destroy { name } => destroy(service, output, &name, with_containers).await,
        Command::Info { name } => info(service, &name).await,
        Command::List => list(service).await,
        Command::Prune => prune(service, output).await,
        Command::Reload { name, subnet } => {
            reload(service, output, &name, subnet.as_deref()).await
        }
        Command::Rename { old, new, subnet } => {
            rename(service, output, &old, &new, subnet.as_deref()).await
        }
        Command::Up(args) => up(service, &args).await,
        Command::Down(args) => down(service, &args).await,
        Command::Version => Ok(version()),
    };
    outcome.unwrap_or_else(|e| Rendered::error(action, &e))
}

pub fn version() -> Rendered {
    let version = env!("CARGO_PKG_VERSION");
    Rendered::new(
        OperationResult::success("version", json!({ "version": version })),
        vec![format!("docknet {version}")],
    )
}

// ============================================================================
// Operator commands
// ============================================================================

async fn init<L: NetworkLifecycle + ?Sized>(service: &L, name: &str, subnet: &str) -> Outcome {
    let name = NetworkName::parse(name)?;
    let report = service.init(&name, subnet).await?;
    let line = format!(
        "Network {} created with subnet {}.",
        report.name, report.subnet
    );
    Ok(Rendered::report("init", &report, vec![line]))
}

async fn destroy<L: NetworkLifecycle + ?Sized>(
    service: &L,
    output: &OutputOptions,
    name: &str,
    with_containers: bool,
) -> Outcome {
    let name = NetworkName::parse(name)?;
    service.info(&name).await?;

    if !output.confirm(&format!("Remove network {name}?")) {
        return Ok(Rendered::cancelled("destroy", json!({ "name": name })));
    }

    let report = service.remove(&name, with_containers).await?;
    let data = json!({
        "name": &report.name,
        "removed_containers": &report.removed_containers,
    });
    Ok(Rendered::new(
        OperationResult::success("destroy", data),
        removal_lines(&report),
    ))
}

async fn info<L: NetworkLifecycle + ?Sized>(service: &L, name: &str) -> Outcome {
    let name = NetworkName::parse(name)?;
    let info = service.info(&name).await?;
    Ok(Rendered::new(
        OperationResult::success("info", output::info_data(&info)),
        output::info_lines(&info),
    ))
}

async fn list<L: NetworkLifecycle + ?Sized>(service: &L) -> Outcome {
    let networks = service.list().await?;

    let mut lines = Vec::new();
    if networks.is_empty() {
        lines.push("No managed networks.".to_string());
    } else {
        let width = networks
            .iter()
            .map(|n| n.row.name.len())
            .max()
            .unwrap_or(0)
            .max("NAME".len());
        lines.push(format!("{:<width$}  SUBNETS", "NAME"));
        for network in &networks {
            lines.push(format!(
                "{:<width$}  {}",
                network.row.name,
                join_or_dash(&network.subnets)
            ));
        }
    }

    let count = networks.len();
    let data = json!({ "count": count, "items": networks });
    Ok(Rendered::new(OperationResult::success("list", data), lines))
}

async fn prune<L: NetworkLifecycle + ?Sized>(service: &L, output: &OutputOptions) -> Outcome {
    let candidates: Vec<String> = service
        .prune_candidates()
        .await?
        .into_iter()
        .map(|n| n.row.name)
        .collect();

    if candidates.is_empty() {
        return Ok(Rendered::new(
            output::prune_result(&PruneReport::default()),
            vec!["Nothing to prune.".to_string()],
        ));
    }

    let prompt = format!(
        "Remove {} unused network(s): {}?",
        candidates.len(),
        candidates.join(", ")
    );
    if !output.confirm(&prompt) {
        return Ok(Rendered::cancelled(
            "prune",
            json!({ "candidates": candidates }),
        ));
    }

    let report = service.prune(&candidates).await?;
    let mut lines = vec![format!("Pruned: {}", join_or_dash(&report.pruned))];
    if !report.failed.is_empty() {
        lines.push(format!("Failed: {}", report.failed.join(", ")));
    }
    Ok(Rendered::new(output::prune_result(&report), lines))
}

async fn reload<L: NetworkLifecycle + ?Sized>(
    service: &L,
    output: &OutputOptions,
    name: &str,
    subnet: Option<&str>,
) -> Outcome {
    let name = NetworkName::parse(name)?;
    let plan = service.plan_rename(&name, &name, subnet).await?;

    let prompt = format!(
        "Recreate network {name} with subnet {}? Attached containers will be reconnected.",
        plan.subnet
    );
    if !output.confirm(&prompt) {
        return Ok(Rendered::cancelled("reload", json!({ "name": name })));
    }

    let report = service.execute_rename(&plan).await?;
    Ok(Rendered::report("reload", &report, rename_lines(&report)))
}

async fn rename<L: NetworkLifecycle + ?Sized>(
    service: &L,
    output: &OutputOptions,
    old: &str,
    new: &str,
    subnet: Option<&str>,
) -> Outcome {
    let old = NetworkName::parse(old)?;
    let new = NetworkName::parse(new)?;
    let plan = service.plan_rename(&old, &new, subnet).await?;

    let prompt = format!(
        "Rename network {old} to {new} with subnet {}? Attached containers will be moved.",
        plan.subnet
    );
    if !output.confirm(&prompt) {
        return Ok(Rendered::cancelled(
            "rename",
            json!({ "old": old, "new": new }),
        ));
    }

    let report = service.execute_rename(&plan).await?;
    Ok(Rendered::report("rename", &report, rename_lines(&report)))
}

// ============================================================================
// Machine hooks
// ============================================================================

async fn up<L: NetworkLifecycle + ?Sized>(service: &L, args: &UpArgs) -> Outcome {
    let machine = MachineId::parse(&args.machine_id)?;
    let spec = build_spec(args)?;
    let report = service.ensure(&machine, &spec).await?;

    let line = match report.outcome {
        EnsureOutcome::Created => format!(
            "Network {} created with subnet {}.",
            report.name,
            report.subnet.as_deref().unwrap_or("-")
        ),
        EnsureOutcome::Adopted => format!("Network {} already exists; adopted.", report.name),
        EnsureOutcome::Foreign => format!(
            "Network {} exists and is not managed by this machine; left untouched.",
            report.name
        ),
    };
    Ok(Rendered::report("up", &report, vec![line]))
}

async fn down<L: NetworkLifecycle + ?Sized>(service: &L, args: &DownArgs) -> Outcome {
    let machine = MachineId::parse(&args.machine_id)?;
    let name = NetworkName::parse(&args.name)?;
    let report = service.destroy(&machine, &name, !args.no_cleanup).await?;

    let lines = match report.outcome {
        DestroyOutcome::Removed => removal_lines(&report),
        DestroyOutcome::AlreadyAbsent => vec![format!("Network {name} is already gone.")],
        DestroyOutcome::NotOwned => {
            vec![format!("Network {name} is not owned by this machine; left untouched.")]
        }
        DestroyOutcome::Skipped => vec![format!("Cleanup disabled; network {name} kept.")],
    };
    Ok(Rendered::report("down", &report, lines))
}

/// The network `up` asks for.
///
/// A custom subnet drops the default gateway, which would fall outside it.
fn build_spec(args: &UpArgs) -> Result<NetworkSpec, ControlError> {
    let name = NetworkName::parse(&args.name)?;
    let driver = args.driver.parse::<Driver>()?;

    let mut spec = NetworkSpec::default()
        .with_name(name)
        .with_driver(driver)
        .with_ip_range(args.ip_range.clone())
        .with_parent(args.parent.clone())
        .attachable(args.attachable)
        .ipv6(args.ipv6);

    if let Some(subnet) = &args.subnet {
        spec = spec
            .with_subnet(Some(subnet.clone()))
            .with_gateway(args.gateway.clone());
    } else if args.gateway.is_some() {
        spec = spec.with_gateway(args.gateway.clone());
    }
    Ok(spec)
}

// ============================================================================
// Text helpers
// ============================================================================

fn removal_lines(report: &DestroyReport) -> Vec<String> {
    let mut lines = vec![format!("Network {} removed.", report.name)];
    if !report.removed_containers.is_empty() {
        lines.push(format!(
            "Removed containers: {}",
            report.removed_containers.join(", ")
        ));
    }
    for failure in &report.endpoint_failures {
        lines.push(format!(
            "Warning: could not detach {}: {}",
            failure.endpoint, failure.error
        ));
    }
    lines
}

fn rename_lines(report: &RenameReport) -> Vec<String> {
    let mut lines = if report.old == report.new {
        vec![format!(
            "Network {} recreated with subnet {}.",
            report.new, report.subnet
        )]
    } else {
        vec![format!(
            "Network {} renamed to {} with subnet {}.",
            report.old, report.new, report.subnet
        )]
    };
    if !report.reconnected.is_empty() {
        lines.push(format!("Reconnected: {}", report.reconnected.join(", ")));
    }
    if report.is_partial() {
        lines.push(format!(
            "Not reconnected: {}",
            report.failed_reconnect.join(", ")
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use docknet_control::{LifecycleService, OutcomeStatus};
    use docknet_core::labels::{MACHINE_LABEL, PLUGIN_LABEL, PLUGIN_LABEL_VALUE};
    use docknet_daemon::MockDaemon;
    use docknet_store::FileMarkerStore;
    use tempfile::TempDir;

    type Service = LifecycleService<MockDaemon, FileMarkerStore>;

    const MANAGED: &[(&str, &str)] = &[(PLUGIN_LABEL, PLUGIN_LABEL_VALUE)];

    fn setup() -> (Service, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = FileMarkerStore::open(dir.path()).unwrap();
        let service = LifecycleService::with_defaults(Arc::new(MockDaemon::new()), Arc::new(store));
        (service, dir)
    }

    fn json_output() -> OutputOptions {
        OutputOptions::new(true, false, false)
    }

    fn up_args(machine: &str, name: &str) -> UpArgs {
        UpArgs {
            machine_id: machine.to_string(),
            name: name.to_string(),
            driver: "bridge".to_string(),
            subnet: None,
            gateway: None,
            ip_range: None,
            parent: None,
            ipv6: false,
            attachable: false,
        }
    }

    async fn run(service: &Service, command: Command) -> Rendered {
        execute(service, &json_output(), command, false).await
    }

    #[tokio::test]
    async fn init_then_list() {
        let (service, _dir) = setup();
        let rendered = run(
            &service,
            Command::Init {
                name: "net-a".into(),
                subnet: "10.20.0.0/24".into(),
            },
        )
        .await;
        assert_eq!(rendered.code(), 0);
        assert_eq!(rendered.result.data.unwrap()["subnet"], "10.20.0.0/24");

        let rendered = run(&service, Command::List).await;
        let data = rendered.result.data.unwrap();
        assert_eq!(data["count"], 1);
        assert_eq!(data["items"][0]["name"], "net-a");
        assert!(rendered.lines[1].contains("10.20.0.0/24"));
    }

    #[tokio::test]
    async fn invalid_name_is_rejected_before_the_daemon() {
        let (service, _dir) = setup();
        let rendered = run(&service, Command::Info { name: "bad/name".into() }).await;
        assert_eq!(rendered.code(), 1);
        assert_eq!(rendered.result.status, OutcomeStatus::Error);
        assert!(service.daemon().calls().is_empty());
    }

    #[tokio::test]
    async fn unavailable_daemon_exits_with_two() {
        let (service, _dir) = setup();
        service.daemon().set_unavailable(true);
        let rendered = run(&service, Command::List).await;
        assert_eq!(rendered.code(), 2);
        assert!(rendered.result.error.unwrap().contains("unavailable"));
    }

    #[tokio::test]
    async fn destroy_reports_name_and_containers() {
        let (service, _dir) = setup();
        service
            .daemon()
            .add_network("net-a", Some("10.0.0.0/24"), MANAGED);
        service.daemon().attach("net-a", "web");

        let rendered = execute(
            &service,
            &json_output(),
            Command::Destroy { name: "net-a".into() },
            true,
        )
        .await;
        assert_eq!(rendered.code(), 0);
        let data = rendered.result.data.unwrap();
        assert_eq!(data["name"], "net-a");
        assert_eq!(data["removed_containers"], json!(["web"]));
        assert!(!service.daemon().has_network("net-a"));
    }

    #[tokio::test]
    async fn destroy_missing_network_fails() {
        let (service, _dir) = setup();
        let rendered = run(&service, Command::Destroy { name: "ghost".into() }).await;
        assert_eq!(rendered.code(), 1);
        assert!(rendered.result.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn prune_empty_and_full() {
        let (service, _dir) = setup();
        let rendered = run(&service, Command::Prune).await;
        assert_eq!(rendered.code(), 0);
        assert_eq!(
            rendered.result.data.unwrap(),
            json!({ "pruned": 0, "items": [] })
        );

        service
            .daemon()
            .add_network("idle", Some("10.0.0.0/24"), MANAGED);
        service
            .daemon()
            .add_network("busy", Some("10.0.1.0/24"), MANAGED);
        service.daemon().attach("busy", "web");

        let rendered = run(&service, Command::Prune).await;
        assert_eq!(rendered.code(), 0);
        assert_eq!(
            rendered.result.data.unwrap(),
            json!({ "pruned": 1, "items": ["idle"] })
        );
        assert!(service.daemon().has_network("busy"));
    }

    #[tokio::test]
    async fn reload_keeps_containers() {
        let (service, _dir) = setup();
        service
            .daemon()
            .add_network("net-a", Some("10.0.0.0/24"), MANAGED);
        service.daemon().attach("net-a", "web");

        let rendered = run(
            &service,
            Command::Reload {
                name: "net-a".into(),
                subnet: Some("10.5.0.0/24".into()),
            },
        )
        .await;
        assert_eq!(rendered.code(), 0);
        assert_eq!(service.daemon().endpoints_of("net-a"), vec!["web"]);
        assert_eq!(rendered.lines[0], "Network net-a recreated with subnet 10.5.0.0/24.");
    }

    #[tokio::test]
    async fn up_then_down() {
        let (service, _dir) = setup();
        let mut args = up_args("m-1", "dev-net");
        args.subnet = Some("10.30.0.0/24".into());

        let rendered = run(&service, Command::Up(args)).await;
        assert_eq!(rendered.code(), 0);
        assert_eq!(rendered.result.data.unwrap()["outcome"], "created");

        let rendered = run(
            &service,
            Command::Down(DownArgs {
                machine_id: "m-2".into(),
                name: "dev-net".into(),
                no_cleanup: false,
            }),
        )
        .await;
        assert_eq!(rendered.result.status, OutcomeStatus::Noop);
        assert!(service.daemon().has_network("dev-net"));

        let rendered = run(
            &service,
            Command::Down(DownArgs {
                machine_id: "m-1".into(),
                name: "dev-net".into(),
                no_cleanup: false,
            }),
        )
        .await;
        assert_eq!(rendered.result.status, OutcomeStatus::Success);
        assert!(!service.daemon().has_network("dev-net"));
    }

    #[tokio::test]
    async fn up_leaves_foreign_network_alone() {
        let (service, _dir) = setup();
        service.daemon().add_network(
            "dev-net",
            Some("10.30.0.0/24"),
            &[(PLUGIN_LABEL, PLUGIN_LABEL_VALUE), (MACHINE_LABEL, "m-9")],
        );

        let rendered = run(&service, Command::Up(up_args("m-1", "dev-net"))).await;
        assert_eq!(rendered.result.status, OutcomeStatus::Noop);
        assert_eq!(rendered.code(), 0);
        assert_eq!(service.daemon().create_calls(), 0);
    }

    #[test]
    fn custom_subnet_drops_default_gateway() {
        let mut args = up_args("m-1", "dev-net");
        args.subnet = Some("10.30.0.0/24".into());
        let spec = build_spec(&args).unwrap();
        assert_eq!(spec.subnet.as_deref(), Some("10.30.0.0/24"));
        assert!(spec.gateway.is_none());

        let spec = build_spec(&up_args("m-1", "dev-net")).unwrap();
        assert!(spec.gateway.is_some());
    }

    #[test]
    fn unknown_driver_is_a_validation_error() {
        let mut args = up_args("m-1", "dev-net");
        args.driver = "overlay".into();
        let err = build_spec(&args).unwrap_err();
        assert!(err.to_string().contains("overlay"));
    }
}
