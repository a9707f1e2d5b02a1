use std::fmt;

const GENERATED_PREFIX: &str = "tab-";

#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct TabId(pub(crate) String);

impl TabId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub(crate) fn from_counter(value: u64) -> Self {
        Self(format!("{GENERATED_PREFIX}{value}"))
    }

    /// Counter value of an id minted by this process (`tab-N`), if it has that form.
    pub(crate) fn counter_value(&self) -> Option<u64> {
        self.0.strip_prefix(GENERATED_PREFIX)?.parse().ok()
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
