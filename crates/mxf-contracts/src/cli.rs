// CLI surface contract (§6 "CLI surface").
//
// Only the exit-code/credential-format contract lives here; the verbs
// themselves (`channel:create`, `key:generate`, `setup:interactive`)
// are implemented in `mxf-cli`.

/// Process exit codes for the three in-scope CLI verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum CliExitCode {
    Success = 0,
    ValidationOrAuthFailure = 1,
    ServerFailure = 2,
    Timeout = 3,
}

impl CliExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Formats the env-assignment pair emitted by `key:generate`, per the
/// `MXF_<CHANNEL>_<AGENT>_{KEY_ID,SECRET_KEY}` convention.
pub fn credential_env_names(channel_id: &str, agent_id: &str) -> (String, String) {
    let prefix = format!(
        "MXF_{}_{}",
        channel_id.to_uppercase().replace(['-', ' '], "_"),
        agent_id.to_uppercase().replace(['-', ' '], "_")
    );
    (format!("{prefix}_KEY_ID"), format!("{prefix}_SECRET_KEY"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_contract() {
        assert_eq!(CliExitCode::Success.code(), 0);
        assert_eq!(CliExitCode::ValidationOrAuthFailure.code(), 1);
        assert_eq!(CliExitCode::ServerFailure.code(), 2);
        assert_eq!(CliExitCode::Timeout.code(), 3);
    }

    #[test]
    fn credential_env_names_normalize_separators() {
        let (key_id, secret_key) = credential_env_names("my-channel", "agent one");
        assert_eq!(key_id, "MXF_MY_CHANNEL_AGENT_ONE_KEY_ID");
        assert_eq!(secret_key, "MXF_MY_CHANNEL_AGENT_ONE_SECRET_KEY");
    }
}
