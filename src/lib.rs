pub mod actuator_context;
pub mod actuator_id;
pub mod actuator_map;
pub mod controller;
pub mod engine;
pub mod sensors;
pub mod session;
pub mod signals;
pub mod state_machine;

/// Fully qualified controller symbol for `symbol` in the program `prefix`.
/// An empty prefix leaves the symbol as is.
pub fn symbol_path(prefix: &str, symbol: &str) -> String {
    if prefix.is_empty() {
        symbol.to_string()
    } else {
        format!("{prefix}.{symbol}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_path() {
        assert_eq!(symbol_path("MAIN", "iCyl1minus"), "MAIN.iCyl1minus");
        assert_eq!(symbol_path("", "qMot2start"), "qMot2start");
    }
}
