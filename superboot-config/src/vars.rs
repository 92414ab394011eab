use alloc::string::{String, ToString};
use alloc::vec::Vec;

/// GRUB variable table bound.
pub const MAX_VARS: usize = 128;
/// Longest accepted variable name.
pub const MAX_VAR_NAME: usize = 64;
/// Longest stored variable value; excess is truncated.
pub const MAX_VAR_VALUE: usize = 512;

/// Insertion-ordered variable table for one GRUB parse.
///
/// Lookup is a linear scan; a repeated `set` overwrites in place, so the
/// latest write wins.
#[derive(Debug, Default)]
pub struct VarTable {
    entries: Vec<(String, String)>,
}

impl VarTable {
    pub fn new() -> Self {
        VarTable::default()
    }

    /// Set or overwrite a variable. Oversized names and writes past the
    /// table bound are dropped.
    pub fn set(&mut self, name: &str, value: &str) {
        if name.is_empty() || name.len() > MAX_VAR_NAME {
            return;
        }
        let value: String = value.chars().take(MAX_VAR_VALUE).collect();

        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value;
        } else if self.entries.len() < MAX_VARS {
            self.entries.push((name.to_string(), value));
        }
    }

    /// Value of a variable; unknown names read as empty.
    pub fn get(&self, name: &str) -> &str {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    /// Substitute `$NAME` and `${NAME}` in a single left-to-right pass.
    ///
    /// Unknown names expand to empty; a `$` followed by neither a name
    /// character nor `{` is kept literally. Substituted values are not
    /// rescanned, so expansion is idempotent for inputs without `$`.
    pub fn expand(&self, src: &str) -> String {
        let mut out = String::with_capacity(src.len());
        let mut chars = src.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                out.push(c);
                continue;
            }

            match chars.peek() {
                Some('{') => {
                    chars.next();
                    let mut name = String::new();
                    for c in chars.by_ref() {
                        if c == '}' {
                            break;
                        }
                        name.push(c);
                    }
                    out.push_str(self.get(&name));
                }
                Some(&c) if c.is_ascii_alphanumeric() || c == '_' => {
                    let mut name = String::new();
                    while let Some(&c) = chars.peek() {
                        if c.is_ascii_alphanumeric() || c == '_' {
                            name.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    out.push_str(self.get(&name));
                }
                _ => out.push('$'),
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_write_wins() {
        let mut t = VarTable::new();
        t.set("root", "hd0");
        t.set("root", "hd1");
        assert_eq!(t.get("root"), "hd1");
    }

    #[test]
    fn unknown_names_read_empty() {
        let t = VarTable::new();
        assert_eq!(t.get("nope"), "");
        assert_eq!(t.expand("a $nope b"), "a  b");
    }

    #[test]
    fn both_reference_forms_expand() {
        let mut t = VarTable::new();
        t.set("kver", "6.6");
        assert_eq!(t.expand("/vmlinuz-$kver"), "/vmlinuz-6.6");
        assert_eq!(t.expand("/initrd-${kver}.img"), "/initrd-6.6.img");
    }

    #[test]
    fn expansion_is_idempotent_without_dollar() {
        let mut t = VarTable::new();
        t.set("x", "y");
        let plain = "root=UUID=abc rw quiet";
        let once = t.expand(plain);
        assert_eq!(once, plain);
        assert_eq!(t.expand(&once), once);
    }

    #[test]
    fn lone_dollar_is_literal() {
        let t = VarTable::new();
        assert_eq!(t.expand("cost: 5$ ok"), "cost: 5$ ok");
    }

    #[test]
    fn table_is_bounded() {
        let mut t = VarTable::new();
        for i in 0..(MAX_VARS + 10) {
            t.set(&alloc::format!("var{i}"), "v");
        }
        assert_eq!(t.get("var0"), "v");
        assert_eq!(t.get(&alloc::format!("var{}", MAX_VARS + 5)), "");
    }
}
