//! Conversion options stored per Lua state.

use mlua::Lua;

/// Default recursion limit for one top-level conversion.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Default annotation key naming a struct field's script-visible key.
pub const DEFAULT_TAG_KEY: &str = "lua";

/// Whether composites are copied into Lua tables or wrapped as proxies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Copy,
    Proxy,
}

/// Options read at the start of every top-level conversion.
///
/// # Example
///
/// ```
/// use luar::{ConvertOptions, configure};
///
/// let lua = mlua::Lua::new();
/// configure(&lua, ConvertOptions::new().with_max_depth(32).with_tag_key("script"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    max_depth: usize,
    tag_key: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            tag_key: DEFAULT_TAG_KEY.to_string(),
        }
    }
}

impl ConvertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_tag_key(mut self, tag_key: impl Into<String>) -> Self {
        self.tag_key = tag_key.into();
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn tag_key(&self) -> &str {
        &self.tag_key
    }
}

/// Store `options` in `lua`. Later conversions on this state, including
/// those made by bridged functions, use them.
pub fn configure(lua: &Lua, options: ConvertOptions) {
    lua.set_app_data(options);
}

/// Options currently stored in `lua`, or the defaults.
pub fn current(lua: &Lua) -> ConvertOptions {
    lua.app_data_ref::<ConvertOptions>()
        .map(|options| options.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = ConvertOptions::default();
        assert_eq!(options.max_depth(), 256);
        assert_eq!(options.tag_key(), "lua");
    }

    #[test]
    fn configure_replaces_current() {
        let lua = Lua::new();
        assert_eq!(current(&lua), ConvertOptions::default());

        configure(&lua, ConvertOptions::new().with_tag_key("json"));
        assert_eq!(current(&lua).tag_key(), "json");
        assert_eq!(current(&lua).max_depth(), DEFAULT_MAX_DEPTH);
    }
}
