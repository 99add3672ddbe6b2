//! Fixed access-policy documents installed on each backend at startup.
//!
//! Policies are named, fixed-content rules scoped to the per-token secret
//! path. They are installed once during registry initialization and never
//! mutated afterwards.

/// Name of the policy attached to every issued bearer token.
pub const DEFAULT_POLICY_NAME: &str = "user";

/// Secret path every policy (and every secret operation) is scoped to.
pub const SECRET_PATH: &str = "cubbyhole/secrets";

/// All capabilities including sudo.
pub const SUDO_CAPABILITIES: &str =
    "capabilities = [\"create\", \"read\", \"update\", \"delete\", \"list\", \"sudo\"]";

/// Create, read, update, delete and list capabilities. Installed as the
/// default policy for issued tokens.
pub const CRUD_CAPABILITIES: &str =
    "capabilities = [\"create\", \"read\", \"update\", \"delete\", \"list\"]";

/// Read-only capability.
pub const READ_ONLY_CAPABILITIES: &str = "capabilities = [\"read\"]";

/// Render a capability set into the policy document the backend expects:
/// a path block scoped to the broker's secret path.
pub fn policy_document(capabilities: &str) -> String {
    format!("path \"{}\" {{ {} }}", SECRET_PATH, capabilities)
}
