/// Represents the identified client and their group membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// The client identifier (e.g., user ID, API key ID)
    pub client_id: String,
    /// The group the client belongs to (e.g., "free", "pro", "enterprise")
    pub group: Option<String>,
    /// The account that owns the secret being delegated, when this client is
    /// acting as a delegate rather than the owner itself. Defaults to
    /// `client_id` when `None`.
    pub owner: Option<String>,
}

impl ClientIdentity {
    /// The owner account for the authorization adapter: `owner` if set,
    /// otherwise `client_id` (the client is acting on its own behalf).
    pub fn owner(&self) -> &str {
        self.owner.as_deref().unwrap_or(&self.client_id)
    }
}
