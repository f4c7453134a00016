//! A CI pipeline: stages run one after another, steps inside a stage run
//! concurrently, and each stage nests under the pipeline task.
//!
//! Shows [`TaskContext::run`] hierarchies, a custom [`Theme`] built with
//! `owo-colors`, per-task style overrides and transient tasks. Pipe the
//! output (`cargo run --example ci 2>&1 | cat`) to see the append-only mode.

use std::sync::Arc;
use std::time::{Duration, Instant};

use owo_colors::OwoColorize;
use task_tally::*;
use tokio::time::sleep;

// ── Theme ────────────────────────────────────────────────────────

struct Pipeline;

impl Theme for Pipeline {
    fn transform(&self, role: Role, depth: usize) -> Option<Transform> {
        let t: Transform = match (role, depth) {
            (Role::Description, 0) => |s| s.bold().magenta().to_string(),
            (Role::Description, 1) => |s| s.cyan().to_string(),
            (Role::Spinner, _) => |s| s.magenta().to_string(),
            (Role::BarFilled, _) => |s| s.blue().to_string(),
            (Role::BarEmpty | Role::Connector | Role::Elapsed | Role::Eta, _) => {
                |s| s.dimmed().to_string()
            }
            (Role::Done, _) => |s| s.green().bold().to_string(),
            (Role::Failed, _) => |s| s.red().bold().to_string(),
            _ => return None,
        };
        Some(t)
    }
}

// ── Work ─────────────────────────────────────────────────────────

#[derive(Debug)]
struct StepFailed(&'static str);

impl std::fmt::Display for StepFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "step `{}` failed", self.0)
    }
}

async fn step(ctx: &TaskContext, name: &'static str, millis: u64) -> Result<(), StepFailed> {
    ctx.run(NewTask::new(name), |_| async move {
        sleep(Duration::from_millis(millis)).await;
        Ok(())
    })
    .await
}

async fn checkout(ctx: TaskContext) -> Result<(), StepFailed> {
    step(&ctx, "fetch origin", 400).await?;
    step(&ctx, "checkout 3f9c2e1", 200).await
}

async fn dependencies(ctx: TaskContext) -> Result<(), StepFailed> {
    let crates = ["tokio", "serde", "tracing", "crossterm", "owo-colors", "indexmap"];
    ctx.run(
        NewTask::new("download crates").total(crates.len() as u64).transient(true),
        |ctx| async move {
            for name in crates {
                sleep(Duration::from_millis(150)).await;
                ctx.log(format!("  downloaded {name}"));
                ctx.advance();
            }
            Ok(())
        },
    )
    .await
}

async fn checks(ctx: TaskContext) -> Result<(), StepFailed> {
    let (fmt, clippy, tests) = tokio::join!(
        step(&ctx, "rustfmt --check", 300),
        step(&ctx, "clippy -D warnings", 900),
        ctx.run(NewTask::new("unit tests").total(48), |ctx| async move {
            for _ in 0..48 {
                sleep(Duration::from_millis(25)).await;
                ctx.advance();
            }
            Ok(())
        }),
    );
    fmt.and(clippy).and(tests)
}

async fn build(ctx: TaskContext) -> Result<(), StepFailed> {
    let targets = ["x86_64-unknown-linux-gnu", "aarch64-apple-darwin", "x86_64-pc-windows-msvc"];
    let wide = StyleOverride::default().bar_chars('=', ' ').spinner(SpinnerFrames::line());
    let builds = targets.map(|target| {
        let ctx = ctx.clone();
        let style = wide.clone();
        async move {
            ctx.run(NewTask::new(target).total(20).style(style), |ctx| async move {
                for _ in 0..20 {
                    sleep(Duration::from_millis(40 + target.len() as u64)).await;
                    ctx.advance();
                }
                Ok(())
            })
            .await
        }
    });
    let [a, b, c] = builds;
    let (a, b, c) = tokio::join!(a, b, c);
    a.and(b).and(c)
}

async fn deploy(ctx: TaskContext) -> Result<(), StepFailed> {
    step(&ctx, "upload artifacts", 500).await?;
    ctx.run(NewTask::new("smoke test"), |_| async {
        sleep(Duration::from_millis(300)).await;
        Err(StepFailed("smoke test"))
    })
    .await
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Error> {
    let started = Instant::now();
    let config = RendererConfig::default()
        .interval(Duration::from_millis(80))
        .step(10)
        .raw_input(true);
    let tally = Tally::new(config)?
        .theme(Arc::new(Pipeline))
        .on_interrupt(|| std::process::exit(130));

    let outcome = tally
        .run(|ctx| async move {
            ctx.run(NewTask::new("pipeline").total(5), |ctx| async move {
                ctx.run(NewTask::new("checkout"), checkout).await?;
                ctx.advance();
                ctx.run(NewTask::new("dependencies"), dependencies).await?;
                ctx.advance();
                ctx.run(NewTask::new("checks"), checks).await?;
                ctx.advance();
                ctx.run(NewTask::new("build"), build).await?;
                ctx.advance();
                ctx.run(NewTask::new("deploy"), deploy).await?;
                ctx.advance();
                Ok::<_, StepFailed>(())
            })
            .await
        })
        .await?;

    let elapsed = started.elapsed().as_secs_f32();
    match outcome {
        Ok(()) => eprintln!("{} in {elapsed:.1}s", "pipeline passed".green().bold()),
        Err(e) => eprintln!("{}: {e} after {elapsed:.1}s", "pipeline failed".red().bold()),
    }
    Ok(())
}
