use async_trait::async_trait;
use flakediff_core::checkout::sanitize_ref;
use flakediff_core::exec::{CommandOutput, CommandRunner, CommandSpec};
use flakediff_core::state::MemoryStateStore;
use flakediff_core::{CheckoutManager, ComparisonTarget, DiffPipeline, PipelineRequest};
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::Barrier;

/// A recorded invocation and whether it went through `run_blocking`
#[derive(Debug, Clone)]
pub struct Call {
    pub spec: CommandSpec,
    pub blocking: bool,
}

impl Call {
    pub fn line(&self) -> String {
        self.spec.to_string()
    }
}

struct Rule {
    needles: Vec<String>,
    outcome: io::Result<CommandOutput>,
}

fn matches(needles: &[String], line: &str) -> bool {
    needles.iter().all(|n| line.contains(n.as_str()))
}

/// Fake git/nix that records every command
///
/// Worktree add/remove/list behave like a tiny in-memory git: added paths
/// are created on disk and listed until removed. Path queries answer with a
/// store path derived from the reference, and the diff tool echoes its two
/// arguments as `<<<`/`>>>` lines. Scripted rules override any of that.
#[derive(Default)]
pub struct ScriptedRunner {
    calls: Mutex<Vec<Call>>,
    worktrees: Mutex<BTreeSet<PathBuf>>,
    rules: Mutex<Vec<Rule>>,
    stalls: Mutex<Vec<Vec<String>>>,
    gates: Mutex<Vec<(Vec<String>, Arc<Barrier>)>>,
}

#[allow(dead_code)]
impl ScriptedRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer commands containing every needle with `output`
    pub fn respond(&self, needles: &[&str], output: CommandOutput) {
        self.push_rule(needles, Ok(output));
    }

    /// Make commands containing every needle exit 1 with `stderr`
    pub fn fail(&self, needles: &[&str], stderr: &str) {
        self.respond(needles, failure(stderr));
    }

    /// Make commands containing every needle fail to spawn
    pub fn spawn_error(&self, needles: &[&str]) {
        self.push_rule(
            needles,
            Err(io::Error::new(io::ErrorKind::NotFound, "program not found")),
        );
    }

    /// Make async commands containing every needle never finish
    ///
    /// Blocking runs of the same command are unaffected.
    pub fn stall(&self, needles: &[&str]) {
        self.stalls
            .lock()
            .unwrap()
            .push(needles.iter().map(|n| n.to_string()).collect());
    }

    /// Hold async commands containing every needle at `barrier` before they run
    pub fn gate(&self, needles: &[&str], barrier: Arc<Barrier>) {
        self.gates
            .lock()
            .unwrap()
            .push((needles.iter().map(|n| n.to_string()).collect(), barrier));
    }

    fn push_rule(&self, needles: &[&str], outcome: io::Result<CommandOutput>) {
        self.rules.lock().unwrap().push(Rule {
            needles: needles.iter().map(|n| n.to_string()).collect(),
            outcome,
        });
    }

    /// Pretend git already has a worktree at `path`
    pub fn register_worktree(&self, path: &Path) {
        self.worktrees.lock().unwrap().insert(path.to_path_buf());
    }

    pub fn has_worktree(&self, path: &Path) -> bool {
        self.worktrees.lock().unwrap().contains(path)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.calls().iter().map(Call::line).collect()
    }

    /// Recorded commands whose line contains `needle`
    pub fn matching(&self, needle: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.line().contains(needle))
            .collect()
    }

    /// Index of the first recorded command containing `needle`
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.lines().iter().position(|l| l.contains(needle))
    }

    fn dispatch(&self, spec: &CommandSpec, blocking: bool) -> io::Result<CommandOutput> {
        self.calls.lock().unwrap().push(Call {
            spec: spec.clone(),
            blocking,
        });

        let line = spec.to_string();
        {
            let rules = self.rules.lock().unwrap();
            if let Some(rule) = rules.iter().find(|r| matches(&r.needles, &line)) {
                return match &rule.outcome {
                    Ok(output) => Ok(output.clone()),
                    Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
                };
            }
        }

        let args: Vec<&str> = spec.args.iter().map(String::as_str).collect();
        match (spec.program.as_str(), args.as_slice()) {
            ("git", ["worktree", "add", "--detach", path, _]) => {
                std::fs::create_dir_all(path)?;
                self.worktrees.lock().unwrap().insert(PathBuf::from(path));
                Ok(success(""))
            }
            ("git", ["worktree", "remove", "--force", path]) => {
                let _ = std::fs::remove_dir_all(path);
                self.worktrees.lock().unwrap().remove(Path::new(path));
                Ok(success(""))
            }
            ("git", ["worktree", "list", "--porcelain"]) => {
                let mut listing = String::from("worktree /repo\nHEAD 0000\nbranch refs/heads/main\n");
                for path in self.worktrees.lock().unwrap().iter() {
                    listing.push_str(&format!("\nworktree {}\nHEAD 1111\ndetached\n", path.display()));
                }
                Ok(success(&listing))
            }
            ("nix", rest) if rest.contains(&"path-info") => {
                let reference = rest.last().copied().unwrap_or_default();
                Ok(success(&format!("{}\n", store_path(reference))))
            }
            ("nix", rest) if rest.contains(&"run") => {
                let n = rest.len();
                Ok(success(&format!("<<< {}\n>>> {}\n", rest[n - 2], rest[n - 1])))
            }
            _ => Ok(success("")),
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
        tokio::task::yield_now().await;
        let line = spec.to_string();

        let stalled = self.stalls.lock().unwrap().iter().any(|n| matches(n, &line));
        if stalled {
            self.calls.lock().unwrap().push(Call {
                spec: spec.clone(),
                blocking: false,
            });
            return std::future::pending().await;
        }

        let gate = self
            .gates
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| matches(n, &line))
            .map(|(_, barrier)| barrier.clone());
        if let Some(barrier) = gate {
            barrier.wait().await;
        }

        self.dispatch(spec, false)
    }

    fn run_blocking(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
        self.dispatch(spec, true)
    }
}

/// Store path the scripted `path-info` reports for `reference`
#[allow(dead_code)]
pub fn store_path(reference: &str) -> String {
    format!("/nix/store/{}.drv", sanitize_ref(reference))
}

#[allow(dead_code)]
pub fn success(stdout: &str) -> CommandOutput {
    CommandOutput {
        status: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

#[allow(dead_code)]
pub fn failure(stderr: &str) -> CommandOutput {
    CommandOutput {
        status: Some(1),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// Checkout manager rooted in `temp_root`, with its state store
#[allow(dead_code)]
pub fn checkout_manager(
    runner: Arc<ScriptedRunner>,
    temp_root: &Path,
) -> (CheckoutManager, Arc<MemoryStateStore>) {
    let state = Arc::new(MemoryStateStore::new());
    let manager = CheckoutManager::new(runner, state.clone(), "/repo").with_temp_root(temp_root);
    (manager, state)
}

/// Pipeline over the scripted runner with checkouts under `temp_root`
#[allow(dead_code)]
pub fn pipeline(runner: Arc<ScriptedRunner>, temp_root: &Path) -> DiffPipeline {
    let state = Arc::new(MemoryStateStore::new());
    let checkouts = CheckoutManager::new(runner.clone(), state, "/repo").with_temp_root(temp_root);
    DiffPipeline::new(
        checkouts,
        flakediff_core::resolver::ArtifactResolver::new(runner.clone()),
        flakediff_core::diff_tool::DiffInvoker::new(runner),
    )
}

/// Request for `targets` against `main`, run `42`, flake at the work root
#[allow(dead_code)]
pub fn request(targets: &[(&str, &str)]) -> PipelineRequest {
    PipelineRequest {
        targets: targets
            .iter()
            .map(|(name, attr)| ComparisonTarget::new(*name, *attr))
            .collect(),
        build: false,
        directory: PathBuf::from("."),
        base_ref: "main".to_string(),
        base_sha: "base-sha".to_string(),
        head_sha: "head-sha".to_string(),
        cwd: PathBuf::from("/work"),
        run_id: "42".to_string(),
    }
}
