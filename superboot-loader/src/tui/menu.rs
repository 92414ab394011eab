//! Boot menu.
//!
//! Shows the discovered targets with their source tags, arrow-key
//! navigation, and an auto-boot countdown cancelled by any key press.
//! `e` edits the selected entry's command line in place, `f` opens the
//! file browser, `d` deploys SuperBoot to the internal ESP, Esc reboots.

use alloc::string::String;
use core::fmt::Write;

use log::{error, info};
use superboot_config::ConfigType;
use superboot_config::target::MAX_CMDLINE;
use uefi::Status;
use uefi::proto::console::text::{Color, Key, ScanCode};
use uefi::runtime::ResetType;

use super::{KEY_BACKSPACE, KEY_ENTER, explorer, read_key_blocking};
use crate::scan::{Target, TargetList};
use crate::vfs::Vfs;
use crate::{DEFAULT_TIMEOUT_SECS, deploy};

/// Rows of entries shown at once; the selection scrolls within them.
const VISIBLE_ROWS: usize = 16;

/// Run the menu; returns the index of the entry to boot.
pub fn run(targets: &mut TargetList, vfs: &mut Vfs, auto_boot: bool) -> usize {
    let mut selected = targets
        .entries
        .iter()
        .position(|t| t.is_default)
        .unwrap_or(0);

    let mut timeout: Option<usize> = if auto_boot {
        Some(targets.timeout_hint.unwrap_or(DEFAULT_TIMEOUT_SECS) as usize)
    } else {
        None
    };
    if timeout == Some(0) {
        announce(&targets.entries[selected]);
        return selected;
    }

    uefi::system::with_stdout(|out| {
        let _ = out.clear();
        let _ = out.enable_cursor(false);
    });
    draw(targets, selected, timeout);

    let mut ticks = 0usize;
    loop {
        // 100 ms per tick; ten ticks make one countdown second.
        uefi::boot::stall(100_000);

        let key = uefi::system::with_stdin(|stdin| stdin.read_key());
        if let Ok(Some(key)) = key {
            timeout = None;

            match key {
                Key::Special(ScanCode::UP) => {
                    selected = selected.saturating_sub(1);
                }
                Key::Special(ScanCode::DOWN) => {
                    if selected + 1 < targets.entries.len() {
                        selected += 1;
                    }
                }
                Key::Special(ScanCode::ESCAPE) => {
                    uefi::runtime::reset(ResetType::COLD, Status::SUCCESS, None);
                }
                Key::Printable(c) => match u16::from(c) {
                    KEY_ENTER => {
                        announce(&targets.entries[selected]);
                        return selected;
                    }
                    c if c == u16::from(b'e') || c == u16::from(b'E') => {
                        edit_cmdline(&mut targets.entries[selected]);
                        uefi::system::with_stdout(|out| {
                            let _ = out.clear();
                        });
                    }
                    c if c == u16::from(b'f') || c == u16::from(b'F') => {
                        explorer::run(vfs);
                        uefi::system::with_stdout(|out| {
                            let _ = out.clear();
                        });
                    }
                    c if c == u16::from(b'd') || c == u16::from(b'D') => {
                        uefi::system::with_stdout(|out| {
                            let _ = out.clear();
                        });
                        match deploy::deploy_to_esp(vfs) {
                            Ok(()) => info!("deployed to the internal ESP"),
                            Err(err) => error!("deploy failed: {:?}", err.status()),
                        }
                    }
                    _ => {}
                },
                _ => {}
            }

            draw(targets, selected, timeout);
            continue;
        }

        ticks += 1;
        if ticks >= 10 {
            ticks = 0;
            if let Some(remaining) = timeout.as_mut() {
                if *remaining == 0 {
                    announce(&targets.entries[selected]);
                    return selected;
                }
                *remaining -= 1;
                draw(targets, selected, timeout);
            }
        }
    }
}

/// Clear the screen and show a boot message before handing off.
fn announce(target: &Target) {
    uefi::system::with_stdout(|out| {
        let _ = out.set_color(Color::White, Color::Black);
        let _ = out.clear();
        let _ = writeln!(out, "Booting {}...", target.title);
    });
}

fn source_tag(config_type: ConfigType) -> &'static str {
    match config_type {
        ConfigType::Grub => "[GRUB]",
        ConfigType::SystemdBoot => "[SD-BOOT]",
        ConfigType::Limine => "[LIMINE]",
        ConfigType::Unknown => "[???]",
    }
}

fn draw(targets: &TargetList, selected: usize, timeout: Option<usize>) {
    let scroll = selected.saturating_sub(VISIBLE_ROWS - 1);

    uefi::system::with_stdout(|out| {
        let _ = out.set_cursor_position(0, 0);

        let _ = out.set_color(Color::White, Color::Black);
        let _ = writeln!(out);
        let _ = writeln!(out, "  SuperBoot — Universal Meta-Bootloader");
        let _ = writeln!(out, "  {} entries found", targets.entries.len());
        let _ = writeln!(out);

        for (i, target) in targets
            .entries
            .iter()
            .enumerate()
            .skip(scroll)
            .take(VISIBLE_ROWS)
        {
            if i == selected {
                let _ = out.set_color(Color::White, Color::Blue);
            } else {
                let _ = out.set_color(Color::LightGray, Color::Black);
            }
            let _ = writeln!(out, "  {:<9} {:<60}", source_tag(target.config_type), target.title);
        }

        let _ = out.set_color(Color::LightGray, Color::Black);
        let _ = writeln!(out);
        match timeout {
            Some(secs) => {
                let _ = writeln!(out, "  Auto-boot in {secs}s...                    ");
            }
            None => {
                let _ = writeln!(out, "                                             ");
            }
        }

        let _ = out.set_color(Color::DarkGray, Color::Black);
        let _ = writeln!(
            out,
            "  [Enter] Boot  [e] Edit cmdline  [f] File browser  [d] Deploy  [Esc] Reboot"
        );
        let _ = out.set_color(Color::White, Color::Black);
    });
}

/// Inline ASCII editor for the selected entry's command line. Enter
/// commits the typed text (empty keeps the current line), Esc cancels.
fn edit_cmdline(target: &mut Target) {
    uefi::system::with_stdout(|out| {
        let _ = out.set_color(Color::White, Color::Black);
        let _ = out.clear();
        let _ = out.enable_cursor(true);
        let _ = writeln!(out, "Edit kernel command line for: {}", target.title);
        let _ = writeln!(out);
        let _ = writeln!(out, "Current: {}", target.cmdline);
        let _ = writeln!(out);
        let _ = writeln!(out, "New command line (empty keeps current, Esc cancels):");
        let _ = write!(out, "> ");
    });

    let mut buffer = String::new();
    loop {
        match read_key_blocking() {
            Key::Special(ScanCode::ESCAPE) => break,
            Key::Printable(c) => {
                let c = u16::from(c);
                match c {
                    KEY_ENTER => {
                        if !buffer.is_empty() {
                            target.set_cmdline(&buffer);
                        }
                        break;
                    }
                    KEY_BACKSPACE => {
                        if buffer.pop().is_some() {
                            uefi::system::with_stdout(|out| {
                                let _ = write!(out, "\u{8} \u{8}");
                            });
                        }
                    }
                    0x20..=0x7E => {
                        if buffer.len() + 1 < MAX_CMDLINE {
                            let c = c as u8 as char;
                            buffer.push(c);
                            uefi::system::with_stdout(|out| {
                                let _ = write!(out, "{c}");
                            });
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    uefi::system::with_stdout(|out| {
        let _ = out.enable_cursor(false);
    });
}
