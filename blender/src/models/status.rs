use std::path::PathBuf;

/// One interesting line of blender's stdout.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Running { frame: Option<i32>, status: String },
    Log { status: String },
    Warning { message: String },
    Error { message: String },
    Saved { result: PathBuf },
}

impl Status {
    /// Classify a stdout line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Status> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if line.contains("Warning:") {
            return Some(Status::Warning {
                message: line.to_owned(),
            });
        }

        if line.starts_with("Error:") || line.starts_with("ERROR") {
            return Some(Status::Error {
                message: line.to_owned(),
            });
        }

        // e.g. "Fra:5 Mem:12.34M (Peak 15.00M) | Time:00:01.20 | Rendering 12 / 64 samples"
        if let Some(rest) = line.strip_prefix("Fra:") {
            let frame = rest
                .split(|c: char| !c.is_ascii_digit() && c != '-')
                .next()
                .and_then(|n| n.parse().ok());
            let status = line.split('|').last().unwrap_or(line).trim().to_owned();
            return Some(Status::Running { frame, status });
        }

        // e.g. "Saved: '/tmp/RenderData/out0005.png'"
        if line.starts_with("Saved:") {
            let location = line.split('\'').collect::<Vec<&str>>();
            if let Some(path) = location.get(1) {
                return Some(Status::Saved {
                    result: PathBuf::from(path.trim()),
                });
            }
        }

        Some(Status::Log {
            status: line.to_owned(),
        })
    }
}
