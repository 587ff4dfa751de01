//! Individual commands of the deployment script.

use serde::{Deserialize, Serialize};

use super::quote::{quote_path, shell_quote};

/// One remote command, in the order the script runs them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    ChangeDirectory {
        path: String,
    },
    Pull {
        remote: String,
        branch: String,
    },
    /// Create the virtual environment only when its directory is absent
    EnsureVenv {
        python: String,
        venv_dir: String,
    },
    Activate {
        venv_dir: String,
    },
    InstallDependencies {
        pip: String,
        requirements: String,
    },
    Launch {
        interpreter: String,
        entrypoint: String,
        args: Vec<String>,
    },
}

impl Step {
    pub fn label(&self) -> &'static str {
        match self {
            Step::ChangeDirectory { .. } => "Change directory",
            Step::Pull { .. } => "Pull latest code",
            Step::EnsureVenv { .. } => "Ensure virtual environment",
            Step::Activate { .. } => "Activate virtual environment",
            Step::InstallDependencies { .. } => "Install dependencies",
            Step::Launch { .. } => "Start application",
        }
    }

    /// Shell text for this step.
    pub fn command(&self) -> String {
        match self {
            Step::ChangeDirectory { path } => format!("cd {}", quote_path(path)),
            Step::Pull { remote, branch } => format!(
                "git pull {} {}",
                shell_quote(remote),
                shell_quote(branch)
            ),
            Step::EnsureVenv { python, venv_dir } => {
                let dir = shell_quote(venv_dir);
                format!(
                    "if [ ! -d {dir} ]; then {} -m venv {dir}; fi",
                    shell_quote(python)
                )
            }
            Step::Activate { venv_dir } => {
                format!("source {}/bin/activate", shell_quote(venv_dir))
            }
            Step::InstallDependencies { pip, requirements } => format!(
                "{} install -r {}",
                shell_quote(pip),
                shell_quote(requirements)
            ),
            Step::Launch {
                interpreter,
                entrypoint,
                args,
            } => {
                let mut words = vec![shell_quote(interpreter), shell_quote(entrypoint)];
                words.extend(args.iter().map(|arg| shell_quote(arg)));
                words.join(" ")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_render_literally() {
        let cases = [
            (
                Step::ChangeDirectory {
                    path: "/srv/placement-bot".to_string(),
                },
                "cd /srv/placement-bot",
            ),
            (
                Step::Pull {
                    remote: "origin".to_string(),
                    branch: "main".to_string(),
                },
                "git pull origin main",
            ),
            (
                Step::EnsureVenv {
                    python: "python3".to_string(),
                    venv_dir: ".venv".to_string(),
                },
                "if [ ! -d .venv ]; then python3 -m venv .venv; fi",
            ),
            (
                Step::Activate {
                    venv_dir: ".venv".to_string(),
                },
                "source .venv/bin/activate",
            ),
            (
                Step::InstallDependencies {
                    pip: "pip".to_string(),
                    requirements: "requirements.txt".to_string(),
                },
                "pip install -r requirements.txt",
            ),
            (
                Step::Launch {
                    interpreter: "python".to_string(),
                    entrypoint: "app.py".to_string(),
                    args: vec!["-d".to_string()],
                },
                "python app.py -d",
            ),
        ];

        for (step, expected) in cases {
            assert_eq!(step.command(), expected, "step {:?}", step.label());
        }
    }

    #[test]
    fn launch_arguments_are_quoted() {
        let step = Step::Launch {
            interpreter: "python".to_string(),
            entrypoint: "app.py".to_string(),
            args: vec!["--name".to_string(), "placement bot".to_string()],
        };
        assert_eq!(step.command(), "python app.py --name 'placement bot'");
    }
}
