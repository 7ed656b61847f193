use course_migrator::{Registry, Report, Scope, TargetStatus, UnitState};

pub fn print_registry(registry: &Registry) {
    for scope in Scope::ALL {
        println!("{scope}:");

        for unit in registry.discover(scope) {
            println!("  {}", unit.id());
        }
    }
}

pub fn print_report(report: &Report) {
    for target in &report.targets {
        match &target.result {
            Ok(ids) if ids.is_empty() => println!("ok    {}: up to date", target.target),
            Ok(ids) => {
                println!("ok    {}:", target.target);

                for id in ids {
                    println!("        {id}");
                }
            }
            Err(err) => println!("FAIL  {}: {err}", target.target),
        }
    }

    let failures = report.failures().count();

    if failures > 0 {
        println!("{failures} of {} databases failed", report.targets.len());
    }
}

/// Returns whether every target was reachable and drift free.
pub fn print_status(statuses: &[TargetStatus]) -> bool {
    let mut healthy = true;

    for status in statuses {
        let state = match &status.result {
            Ok(state) => state,
            Err(err) => {
                healthy = false;
                println!("{}: {err}", status.target);
                continue;
            }
        };

        println!("{}: {} pending", status.target, state.pending());

        for unit in &state.units {
            match &unit.state {
                UnitState::Applied(at) => println!("  [x] {} ({at})", unit.id),
                UnitState::Pending => println!("  [ ] {}", unit.id),
                UnitState::Unknown(at) => println!("  [?] {} ({at}, not registered)", unit.id),
            }
        }

        if let Some(drift) = &state.drift {
            healthy = false;
            println!("  drift: {drift}");
        }
    }

    healthy
}
