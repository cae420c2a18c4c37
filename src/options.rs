//! Per-provider registration options

/// Option accepted by [`Registry::provide`](crate::Registry::provide) and
/// [`Registry::provide_value`](crate::Registry::provide_value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderOption {
    /// Resolve the provider once during registration, so factory errors
    /// surface from `provide` instead of first use.
    EagerLoading,

    /// Never cache: the factory runs on every resolution.
    MultiInstance,

    /// Bind a sequence under its element type and hand out one element
    /// per resolution, cycling back to the first.
    RoundRobin,
}

/// Flag set built from a slice of [`ProviderOption`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProviderOptions {
    pub eager_loading: bool,
    pub multi_instance: bool,
    pub round_robin: bool,
}

impl ProviderOptions {
    /// No options set
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one option
    pub fn with(mut self, option: ProviderOption) -> Self {
        match option {
            ProviderOption::EagerLoading => self.eager_loading = true,
            ProviderOption::MultiInstance => self.multi_instance = true,
            ProviderOption::RoundRobin => self.round_robin = true,
        }
        self
    }
}

impl From<&[ProviderOption]> for ProviderOptions {
    fn from(options: &[ProviderOption]) -> Self {
        options.iter().fold(Self::new(), |acc, option| acc.with(*option))
    }
}

impl<const N: usize> From<[ProviderOption; N]> for ProviderOptions {
    fn from(options: [ProviderOption; N]) -> Self {
        Self::from(&options[..])
    }
}
