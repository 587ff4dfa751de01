//! The remote deployment script.
//!
//! Steps always run in the same order: change directory, pull, ensure the
//! virtual environment, activate it, install dependencies, start the app.
//! Configuration changes what each command looks like, never the order.

mod quote;
mod step;

pub use quote::{quote_path, shell_quote};
pub use step::Step;

use crate::config::ScriptConfig;

const MARKER_PREFIX: &str = "==> [";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployScript {
    steps: Vec<Step>,
    strict: bool,
    announce_steps: bool,
    completion_message: String,
}

impl DeployScript {
    pub fn from_config(config: &ScriptConfig, project_path: &str) -> Self {
        let steps = vec![
            Step::ChangeDirectory {
                path: project_path.to_string(),
            },
            Step::Pull {
                remote: config.remote.clone(),
                branch: config.branch.clone(),
            },
            Step::EnsureVenv {
                python: config.python.clone(),
                venv_dir: config.venv_dir.clone(),
            },
            Step::Activate {
                venv_dir: config.venv_dir.clone(),
            },
            Step::InstallDependencies {
                pip: config.pip.clone(),
                requirements: config.requirements.clone(),
            },
            Step::Launch {
                interpreter: config.interpreter.clone(),
                entrypoint: config.entrypoint.clone(),
                args: config.args.clone(),
            },
        ];

        Self {
            steps,
            strict: config.strict,
            announce_steps: config.announce_steps,
            completion_message: config.completion_message.clone(),
        }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Render the script as bash source, one command per line.
    ///
    /// Without strict mode, exit codes are not checked between steps.
    pub fn render(&self) -> String {
        let total = self.steps.len();
        let mut lines = Vec::with_capacity(total * 2 + 2);

        if self.strict {
            lines.push("set -e".to_string());
        }

        for (index, step) in self.steps.iter().enumerate() {
            if self.announce_steps {
                let marker = format!(
                    "{}{}/{}] {}",
                    MARKER_PREFIX,
                    index + 1,
                    total,
                    step.label()
                );
                lines.push(format!("echo {}", shell_quote(&marker)));
            }
            lines.push(step.command());
        }

        if !self.completion_message.is_empty() {
            lines.push(format!("echo {}", shell_quote(&self.completion_message)));
        }

        let mut script = lines.join("\n");
        script.push('\n');
        script
    }
}

/// Highest step number announced in the session output.
pub fn steps_reached(output: &str, total: usize) -> usize {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix(MARKER_PREFIX))
        .filter_map(|rest| {
            let (counter, _) = rest.split_once(']')?;
            let (index, count) = counter.split_once('/')?;
            let index: usize = index.parse().ok()?;
            let count: usize = count.parse().ok()?;
            (count == total && index <= total).then_some(index)
        })
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_config() -> ScriptConfig {
        ScriptConfig {
            announce_steps: false,
            ..ScriptConfig::default()
        }
    }

    #[test]
    fn default_script_matches_command_surface() {
        let script = DeployScript::from_config(&quiet_config(), "~/placement-bot");
        let expected = "\
cd ~/placement-bot
git pull origin main
if [ ! -d .venv ]; then python3 -m venv .venv; fi
source .venv/bin/activate
pip install -r requirements.txt
python app.py -d
echo 'Deployment finished'
";
        assert_eq!(script.render(), expected);
    }

    #[test]
    fn strict_mode_sets_errexit_first() {
        let config = ScriptConfig {
            strict: true,
            ..quiet_config()
        };
        let rendered = DeployScript::from_config(&config, "/srv/bot").render();
        assert!(rendered.starts_with("set -e\ncd /srv/bot\n"));
    }

    #[test]
    fn non_strict_script_has_no_exit_checks() {
        let rendered = DeployScript::from_config(&ScriptConfig::default(), "/srv/bot").render();
        assert!(!rendered.contains("set -e"));
        assert!(!rendered.contains("&&"));
        assert!(!rendered.contains("|| exit"));
    }

    #[test]
    fn markers_precede_each_step() {
        let rendered = DeployScript::from_config(&ScriptConfig::default(), "/srv/bot").render();
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "echo '==> [1/6] Change directory'");
        assert_eq!(lines[1], "cd /srv/bot");
        assert_eq!(lines[10], "echo '==> [6/6] Start application'");
        assert_eq!(lines[11], "python app.py -d");
    }

    #[test]
    fn empty_completion_message_is_omitted() {
        let config = ScriptConfig {
            completion_message: String::new(),
            ..quiet_config()
        };
        let rendered = DeployScript::from_config(&config, "/srv/bot").render();
        assert!(rendered.ends_with("python app.py -d\n"));
    }

    #[test]
    fn steps_reached_reads_markers() {
        let output = "\
==> [1/6] Change directory
==> [2/6] Pull latest code
Already up to date.
==> [3/6] Ensure virtual environment
";
        assert_eq!(steps_reached(output, 6), 3);
        assert_eq!(steps_reached("no markers here", 6), 0);
        // markers from a differently sized script are ignored
        assert_eq!(steps_reached("==> [4/4] Start application", 6), 0);
    }
}
