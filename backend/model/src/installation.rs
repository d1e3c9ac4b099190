/// GitHub App installation identifier, as assigned by GitHub.
pub type InstallationRef = i64;
