use anyhow::{bail, Result};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use std::process::Command;

use crate::cli::ServiceOpts;
use crate::supervisor::launcher::{HostPaths, LaunchPlan, RunMode};

/// Preflight the backend launch plan for the selected run mode and report
/// what would block `deskrig run`.
pub fn run(opts: &ServiceOpts) -> Result<()> {
    let paths = HostPaths::with_overrides(opts.install_root.clone(), opts.resources.clone());
    let plan = LaunchPlan::resolve(opts.mode, &paths);
    let use_color = std::io::stdout().is_terminal();

    println!("Checking backend service ({:?} mode)", opts.mode);

    let mut failures = 0;

    match opts.mode {
        RunMode::Development => {
            check(
                &mut failures,
                use_color,
                &format!("interpreter `{}` runs", plan.program.display()),
                interpreter_available(&plan),
            );
            let script = std::path::Path::new(&plan.args[0]);
            check(
                &mut failures,
                use_color,
                &format!("service script {} exists", script.display()),
                script.is_file(),
            );
        }
        RunMode::Production => {
            check(
                &mut failures,
                use_color,
                &format!("service executable {} exists", plan.program.display()),
                plan.program.is_file(),
            );
        }
    }
    check(
        &mut failures,
        use_color,
        &format!("working directory {} exists", plan.cwd.display()),
        plan.cwd.is_dir(),
    );

    if failures > 0 {
        bail!("{} check(s) failed", failures);
    }
    println!("All checks passed");
    Ok(())
}

fn interpreter_available(plan: &LaunchPlan) -> bool {
    Command::new(&plan.program)
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn check(failures: &mut u32, use_color: bool, label: &str, ok: bool) {
    if ok {
        if use_color {
            println!("  {} {}", "✓".green(), label);
        } else {
            println!("  ok {}", label);
        }
    } else {
        *failures += 1;
        if use_color {
            println!("  {} {}", "✗".red(), label);
        } else {
            println!("  FAIL {}", label);
        }
    }
}
