use bulwark_hal::HalError;
use thiserror::Error;

/// Result type alias for bulwark operations
pub type Result<T> = anyhow::Result<T>;

/// Environment preconditions. All of these are fatal and never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BulwarkError {
    #[error("must run as root (effective uid 0)")]
    NotRoot,

    #[error("missing required tools on PATH: {}", .0.join(", "))]
    MissingTools(Vec<String>),

    #[error("no listener inspection tool available (need `ss` or `netstat`)")]
    NoListenerTool,

    #[error("no service manager available (need `systemctl` or `service`)")]
    NoServiceManager,

    #[error("operator declined to continue")]
    ConsentDeclined,

    #[error("{0} was requested before it was decided in this run")]
    NotYetDecided(&'static str),

    #[error("{0} is already fixed for this run")]
    AlreadyDecided(&'static str),
}

pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_DECLINED: i32 = 2;

/// Map a run error to a process exit status.
///
/// A failed external command propagates its own exit code; a declined consent
/// prompt maps to 2; everything else is 1.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(BulwarkError::ConsentDeclined) = cause.downcast_ref::<BulwarkError>() {
            return EXIT_DECLINED;
        }
        if let Some(code) = cause.downcast_ref::<HalError>().and_then(HalError::exit_code) {
            if code != 0 {
                return code;
            }
        }
    }
    EXIT_FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn command_failure_propagates_exit_code() {
        let err = anyhow::Error::new(HalError::CommandFailed {
            program: "sshd".to_string(),
            code: Some(255),
            stderr: "bad option".to_string(),
        })
        .context("syntax check failed");
        assert_eq!(exit_code(&err), 255);
    }

    #[test]
    fn declined_consent_has_its_own_status() {
        let err = anyhow::Error::new(BulwarkError::ConsentDeclined).context("start");
        assert_eq!(exit_code(&err), EXIT_DECLINED);
    }

    #[test]
    fn other_errors_map_to_one() {
        assert_eq!(exit_code(&anyhow!("boom")), EXIT_FAILURE);
        let err: anyhow::Error = Err::<(), _>(BulwarkError::NotRoot)
            .context("privilege-check")
            .unwrap_err();
        assert_eq!(exit_code(&err), EXIT_FAILURE);
    }

    #[test]
    fn missing_tools_are_listed() {
        let err = BulwarkError::MissingTools(vec!["ufw".to_string(), "sshd".to_string()]);
        assert_eq!(err.to_string(), "missing required tools on PATH: ufw, sshd");
    }
}
