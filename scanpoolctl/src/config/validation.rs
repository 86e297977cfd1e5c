use scanpool_core::ScanPoolConfig;

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }
}

/// Settings that are valid but likely to hurt throughput.
pub fn apply_guard_rails(config: &ScanPoolConfig) -> ConfigWarnings {
    let mut warnings = ConfigWarnings::default();

    let cpus = num_cpus::get();
    if let Some(pool_size) = config.pool_size
        && pool_size > cpus
    {
        warnings.push_with_hint(
            format!("pool_size {pool_size} exceeds the {cpus} available CPUs"),
            "decoders will compete for cores and latency samples will inflate",
        );
    }

    if config.throttle_factor < 1.0 {
        warnings.push_with_hint(
            format!(
                "throttle_factor {} admits frames faster than the pool drains them",
                config.throttle_factor
            ),
            "expect most submissions to be dropped as saturated",
        );
    }

    if config.latency_window == 1 {
        warnings.push(
            "latency_window of 1 makes the throttle follow every single outlier",
        );
    }

    warnings
}
