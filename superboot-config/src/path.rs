use alloc::string::String;

use crate::target::MAX_PATH;

/// Convert a config-file path to UEFI form.
///
/// Strips a leading `(hdN,gptM)`-style device specifier (the scanned
/// partition is authoritative), maps `/` to `\`, and guarantees a leading
/// backslash. The result is capped at [`MAX_PATH`] code units.
pub fn to_uefi_path(src: &str) -> String {
    let mut s = src.trim();

    if s.starts_with('(') {
        match s.find(')') {
            Some(close) => s = &s[close + 1..],
            None => s = "",
        }
    }

    let mut out = String::with_capacity(s.len() + 1);
    if !s.starts_with('/') && !s.starts_with('\\') {
        out.push('\\');
    }
    for c in s.chars() {
        if out.len() >= MAX_PATH {
            break;
        }
        out.push(if c == '/' { '\\' } else { c });
    }
    out
}

/// Strip a Limine device specifier (`boot():`, `guid(XXXX):`) from a path.
pub fn strip_device_spec(src: &str) -> &str {
    match src.find("):") {
        Some(pos) => &src[pos + 2..],
        None => src,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slashes_become_backslashes() {
        assert_eq!(to_uefi_path("/boot/vmlinuz"), "\\boot\\vmlinuz");
        assert_eq!(to_uefi_path("boot/vmlinuz"), "\\boot\\vmlinuz");
    }

    #[test]
    fn device_prefix_is_stripped() {
        assert_eq!(to_uefi_path("(hd0,gpt2)/vmlinuz"), "\\vmlinuz");
        assert_eq!(to_uefi_path("($root)/boot/vmlinuz"), "\\boot\\vmlinuz");
    }

    #[test]
    fn limine_specs_are_stripped() {
        assert_eq!(strip_device_spec("boot():/EFI/x.efi"), "/EFI/x.efi");
        assert_eq!(strip_device_spec("guid(abcd):/k"), "/k");
        assert_eq!(strip_device_spec("/plain"), "/plain");
    }
}
