//! Built-in operations and their DSL functions.
//!
//! | DSL | Operation |
//! |---|---|
//! | `fetch(query, size, fields)` | `fetch` |
//! | `grep_add(field, pattern, name)` | `add_field` |
//! | `value_add(name, value)` | `add_field` |
//! | `load(file)` | `load_file` |

mod add_field;
mod fetch;
mod load_file;

pub use add_field::AddField;
pub use fetch::Fetch;
pub use load_file::LoadFile;

use crate::registry::FunctionRegistry;
use sonar_search::SearchClient;
use std::sync::Arc;

/// Register every built-in.
///
/// Without a search client `fetch` is registered for parsing only.
pub fn register_builtins(registry: &FunctionRegistry, search: Option<Arc<SearchClient>>) {
    match search {
        Some(client) => registry.register(
            "fetch",
            Arc::new(fetch::translate),
            fetch::NAME,
            Arc::new(Fetch::new(client)),
        ),
        None => registry.register_syntax("fetch", Arc::new(fetch::translate)),
    }

    registry.register(
        "grep_add",
        Arc::new(add_field::translate_grep),
        add_field::NAME,
        Arc::new(AddField),
    );
    registry.register_syntax("value_add", Arc::new(add_field::translate_value));

    registry.register(
        "load",
        Arc::new(load_file::translate),
        load_file::NAME,
        Arc::new(LoadFile),
    );
}
