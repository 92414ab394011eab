//! GRUB configuration parser.
//!
//! This is selective extraction, not interpretation. The parser walks the
//! file line by line, mines `menuentry`/`submenu` bodies for `linux`,
//! `initrd`, and `chainloader` commands, feeds `set` into a variable
//! table, and skips shell control flow (`if`..`fi`, `for`/`while`..`done`,
//! `case`..`esac`, `function { .. }`) by tracking the matching closer.
//! Malformed lines are dropped, never fatal. Entries that name neither a
//! kernel nor a chain-load payload are discarded.

use alloc::string::String;
use alloc::vec::Vec;

use crate::path::to_uefi_path;
use crate::target::{BootTarget, ConfigType, MAX_TARGETS};
use crate::vars::VarTable;

/// Parse result: extracted targets plus an optional menu timeout hint.
#[derive(Debug, Default)]
pub struct GrubConfig {
    pub targets: Vec<BootTarget<()>>,
    pub timeout: Option<u32>,
}

/// Closing token expected for a skipped control-flow block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Closer {
    Fi,
    Done,
    Esac,
    Brace,
}

pub fn parse(text: &str) -> GrubConfig {
    Parser::default().run(text)
}

#[derive(Default)]
struct Parser {
    vars: VarTable,
    out: GrubConfig,
    default_spec: Option<String>,
    current: Option<BootTarget<()>>,
    /// Open brace count of the current menu entry.
    menu_depth: u32,
    /// Closers still owed by skipped control-flow blocks.
    skip: Vec<Closer>,
    /// A `function` keyword owes one `{` that must not nest.
    swallow_brace: bool,
}

impl Parser {
    fn run(mut self, text: &str) -> GrubConfig {
        for line in text.lines() {
            let tokens = tokenize(line);
            let mut i = 0;

            while i < tokens.len() {
                if !self.skip.is_empty() {
                    self.skip_token(&tokens[i]);
                    i += 1;
                    continue;
                }
                i = self.dispatch(&tokens, i);
            }
        }

        // Tolerate a missing final `}`.
        self.commit();
        self.apply_default();
        self.out
    }

    /// Consume one token while inside a skipped block.
    fn skip_token(&mut self, token: &str) {
        match token {
            "if" => self.skip.push(Closer::Fi),
            "for" | "while" => self.skip.push(Closer::Done),
            "case" => self.skip.push(Closer::Esac),
            "function" => {
                self.skip.push(Closer::Brace);
                self.swallow_brace = true;
            }
            "{" => {
                if self.swallow_brace {
                    self.swallow_brace = false;
                } else {
                    self.skip.push(Closer::Brace);
                }
            }
            "fi" if self.skip.last() == Some(&Closer::Fi) => drop(self.skip.pop()),
            "done" if self.skip.last() == Some(&Closer::Done) => drop(self.skip.pop()),
            "esac" if self.skip.last() == Some(&Closer::Esac) => drop(self.skip.pop()),
            "}" if self.skip.last() == Some(&Closer::Brace) => drop(self.skip.pop()),
            _ => {}
        }
    }

    /// Handle the command starting at `tokens[i]`; returns the index of
    /// the next unconsumed token.
    fn dispatch(&mut self, tokens: &[String], i: usize) -> usize {
        match tokens[i].as_str() {
            "set" => {
                if let Some(arg) = tokens.get(i + 1) {
                    self.handle_set(arg);
                    i + 2
                } else {
                    i + 1
                }
            }
            "menuentry" | "submenu" => {
                self.commit();
                let mut target = BootTarget::new(ConfigType::Grub);
                if let Some(title) = tokens.get(i + 1) {
                    let title = self.vars.expand(title);
                    target.set_title(&title);
                }
                self.current = Some(target);
                self.menu_depth = 0;
                i + 2
            }
            "linux" | "linux16" | "linuxefi" => {
                let end = command_end(tokens, i + 1);
                if let Some(target) = self.current.as_mut() {
                    if i + 1 < end {
                        target.kernel_path = to_uefi_path(&self.vars.expand(&tokens[i + 1]));
                        let mut args = Vec::new();
                        for token in &tokens[i + 2..end] {
                            args.push(self.vars.expand(token));
                        }
                        target.set_cmdline(&args.join(" "));
                    }
                }
                end
            }
            "initrd" | "initrd16" | "initrdefi" => {
                let end = command_end(tokens, i + 1);
                if let Some(target) = self.current.as_mut() {
                    for token in &tokens[i + 1..end] {
                        target.push_initrd(to_uefi_path(&self.vars.expand(token)));
                    }
                }
                end
            }
            "chainloader" => {
                let end = command_end(tokens, i + 1);
                if let Some(target) = self.current.as_mut() {
                    if i + 1 < end {
                        target.efi_path = to_uefi_path(&self.vars.expand(&tokens[i + 1]));
                        target.is_chainload = true;
                    }
                }
                end
            }
            "search" => {
                // The scanned partition is authoritative; the named
                // variable resolves to it, which strips away as an empty
                // device prefix.
                let end = command_end(tokens, i + 1);
                let mut j = i + 1;
                while j < end {
                    let token = tokens[j].as_str();
                    if let Some(var) = token.strip_prefix("--set=") {
                        self.vars.set(var, "");
                    } else if token == "--set" {
                        if let Some(var) = tokens.get(j + 1) {
                            self.vars.set(var, "");
                            j += 1;
                        }
                    }
                    j += 1;
                }
                end
            }
            "if" => {
                self.skip.push(Closer::Fi);
                i + 1
            }
            "for" | "while" => {
                self.skip.push(Closer::Done);
                i + 1
            }
            "case" => {
                self.skip.push(Closer::Esac);
                i + 1
            }
            "function" => {
                self.skip.push(Closer::Brace);
                self.swallow_brace = true;
                i + 1
            }
            "{" => {
                if self.current.is_some() {
                    self.menu_depth += 1;
                }
                i + 1
            }
            "}" => {
                if self.current.is_some() {
                    self.menu_depth = self.menu_depth.saturating_sub(1);
                    if self.menu_depth == 0 {
                        self.commit();
                    }
                }
                i + 1
            }
            // Anything else (echo, insmod, load_video, --class options …)
            // is not interpreted.
            _ => i + 1,
        }
    }

    fn handle_set(&mut self, arg: &str) {
        let Some((name, value)) = arg.split_once('=') else {
            return;
        };

        match name {
            "default" => self.default_spec = Some(String::from(value)),
            "timeout" => self.out.timeout = value.trim().parse().ok(),
            _ => {}
        }
        self.vars.set(name, value);
    }

    /// Commit the open entry if it is bootable, else drop it.
    fn commit(&mut self) {
        if let Some(mut target) = self.current.take() {
            if target.is_bootable() && self.out.targets.len() < MAX_TARGETS {
                target.index = self.out.targets.len() as u32;
                self.out.targets.push(target);
            }
        }
        self.menu_depth = 0;
    }

    /// Resolve `set default=` after all entries are collected: a numeric
    /// value is an index, otherwise the (last `>`-segment of the) value is
    /// matched against titles, exactly first, then as a substring.
    fn apply_default(&mut self) {
        let Some(spec) = self.default_spec.take() else {
            return;
        };
        let spec = self.vars.expand(&spec);
        if spec.is_empty() || spec == "saved" {
            return;
        }

        let found = if let Ok(index) = spec.parse::<usize>() {
            self.out.targets.get_mut(index)
        } else {
            let name = spec.rsplit('>').next().unwrap_or(&spec).trim();
            let targets = &mut self.out.targets;
            if let Some(pos) = targets.iter().position(|t| t.title == name) {
                targets.get_mut(pos)
            } else if let Some(pos) = targets.iter().position(|t| t.title.contains(name)) {
                targets.get_mut(pos)
            } else {
                None
            }
        };

        if let Some(target) = found {
            target.is_default = true;
        }
    }
}

/// Index just past the arguments of a command starting at `from`: the end
/// of the token list or the first standalone brace, whichever is first.
fn command_end(tokens: &[String], from: usize) -> usize {
    tokens[from..]
        .iter()
        .position(|t| t == "{" || t == "}")
        .map(|p| from + p)
        .unwrap_or(tokens.len())
}

/// Split a line into words.
///
/// Quotes group (and are stripped), `;` separates, `#` starts a comment,
/// and `{`/`}` become standalone tokens — except a `{` directly after `$`,
/// which stays inside the word so `${NAME}` references survive.
fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut quote: Option<char> = None;
    let mut var_brace = false;

    for c in line.chars() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            } else {
                word.push(c);
            }
            continue;
        }

        match c {
            '#' => break,
            '\'' | '"' => quote = Some(c),
            '{' if word.ends_with('$') => {
                word.push(c);
                var_brace = true;
            }
            '}' if var_brace => {
                word.push(c);
                var_brace = false;
            }
            '{' | '}' => {
                if !word.is_empty() {
                    tokens.push(core::mem::take(&mut word));
                }
                tokens.push(String::from(c));
            }
            c if c.is_whitespace() || c == ';' => {
                if !word.is_empty() {
                    tokens.push(core::mem::take(&mut word));
                }
            }
            _ => word.push(c),
        }
    }

    if !word.is_empty() {
        tokens.push(word);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menuentry_with_variables() {
        let cfg = parse(concat!(
            "set root=(hd0,1)\n",
            "set kver=6.6\n",
            "menuentry 'Linux' {\n",
            "    linux /vmlinuz-$kver ro quiet\n",
            "    initrd /initrd-$kver.img\n",
            "}\n",
        ));

        assert_eq!(cfg.targets.len(), 1);
        let t = &cfg.targets[0];
        assert_eq!(t.title, "Linux");
        assert_eq!(t.kernel_path, "\\vmlinuz-6.6");
        assert_eq!(t.initrd_paths, ["\\initrd-6.6.img"]);
        assert_eq!(t.cmdline, "ro quiet");
        assert!(!t.is_chainload);
    }

    #[test]
    fn braced_variable_references_expand() {
        let cfg = parse("set kver=6.6\nmenuentry 'A' {\n linux /k\n initrd /initrd-${kver}.img\n}\n");
        assert_eq!(cfg.targets[0].initrd_paths, ["\\initrd-6.6.img"]);
    }

    #[test]
    fn if_block_is_skipped_even_inline() {
        let cfg = parse(concat!(
            "if [ -f /foo ]; then menuentry 'A' { linux /a } fi\n",
            "menuentry 'B' { linux /b }\n",
        ));

        assert_eq!(cfg.targets.len(), 1);
        assert_eq!(cfg.targets[0].title, "B");
        assert_eq!(cfg.targets[0].kernel_path, "\\b");
    }

    #[test]
    fn multiline_control_flow_is_skipped() {
        let cfg = parse(concat!(
            "function load_video {\n",
            "  insmod all_video\n",
            "}\n",
            "for f in /etc/grub.d/*; do\n",
            "  source $f\n",
            "done\n",
            "menuentry 'Real' {\n",
            "  linux /vmlinuz\n",
            "}\n",
        ));

        assert_eq!(cfg.targets.len(), 1);
        assert_eq!(cfg.targets[0].title, "Real");
    }

    #[test]
    fn device_prefix_is_stripped_from_paths() {
        let cfg = parse("menuentry 'X' {\n linux (hd0,gpt2)/boot/vmlinuz root=/dev/sda2\n}\n");
        assert_eq!(cfg.targets[0].kernel_path, "\\boot\\vmlinuz");
        assert_eq!(cfg.targets[0].cmdline, "root=/dev/sda2");
    }

    #[test]
    fn search_resolves_to_scanned_partition() {
        let cfg = parse(concat!(
            "search --no-floppy --fs-uuid --set=root abcd-1234\n",
            "menuentry 'X' {\n",
            "  linux ($root)/vmlinuz\n",
            "}\n",
        ));
        assert_eq!(cfg.targets[0].kernel_path, "\\vmlinuz");
    }

    #[test]
    fn entry_without_kernel_or_chainload_is_discarded() {
        let cfg = parse("menuentry 'Memtest' {\n  echo hello\n}\nmenuentry 'K' { linux /k }\n");
        assert_eq!(cfg.targets.len(), 1);
        assert_eq!(cfg.targets[0].title, "K");
    }

    #[test]
    fn chainloader_entries_commit() {
        let cfg = parse("menuentry 'Windows' {\n  chainloader /EFI/Microsoft/Boot/bootmgfw.efi\n}\n");
        let t = &cfg.targets[0];
        assert!(t.is_chainload);
        assert_eq!(t.efi_path, "\\EFI\\Microsoft\\Boot\\bootmgfw.efi");
    }

    #[test]
    fn default_by_title_and_by_index() {
        let cfg = parse(concat!(
            "set default=\"B\"\n",
            "menuentry 'A' { linux /a }\n",
            "menuentry 'B' { linux /b }\n",
        ));
        assert!(!cfg.targets[0].is_default);
        assert!(cfg.targets[1].is_default);

        let cfg = parse(concat!(
            "set default=1\n",
            "menuentry 'A' { linux /a }\n",
            "menuentry 'B' { linux /b }\n",
        ));
        assert!(cfg.targets[1].is_default);
    }

    #[test]
    fn timeout_is_forwarded() {
        let cfg = parse("set timeout=3\nmenuentry 'A' { linux /a }\n");
        assert_eq!(cfg.timeout, Some(3));
    }

    #[test]
    fn multiple_initrds_in_order() {
        let cfg = parse("menuentry 'A' {\n linux /k\n initrd /ucode.img /initrd.img\n}\n");
        assert_eq!(cfg.targets[0].initrd_paths, ["\\ucode.img", "\\initrd.img"]);
    }

    #[test]
    fn initrd_count_is_bounded() {
        let mut body = String::from("menuentry 'A' {\n linux /k\n");
        for i in 0..12 {
            body.push_str(&alloc::format!(" initrd /i{i}.img\n"));
        }
        body.push_str("}\n");
        let cfg = parse(&body);
        assert_eq!(cfg.targets[0].initrd_paths.len(), 8);
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let cfg = parse("# header\n\nmenuentry 'A' { linux /a } # trailing\n");
        assert_eq!(cfg.targets.len(), 1);
    }

    #[test]
    fn quoted_titles_keep_spaces() {
        let cfg = parse("menuentry 'Arch Linux (fallback)' --class arch { linux /k }\n");
        assert_eq!(cfg.targets[0].title, "Arch Linux (fallback)");
    }

    #[test]
    fn target_list_is_bounded() {
        let mut body = String::new();
        for i in 0..80 {
            body.push_str(&alloc::format!("menuentry 'E{i}' {{ linux /k{i} }}\n"));
        }
        let cfg = parse(&body);
        assert_eq!(cfg.targets.len(), MAX_TARGETS);
    }
}
