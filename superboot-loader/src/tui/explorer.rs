//! EFI file browser.
//!
//! Navigable view of the firmware-readable partitions. Directories can
//! be entered, and a selected `.efi` binary is chain-loaded directly —
//! the recovery path when no config scans or a boot fails.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write;

use uefi::boot::{self, SearchType};
use uefi::proto::console::text::{Color, Key, ScanCode};
use uefi::proto::media::fs::SimpleFileSystem;
use uefi::Handle;

use super::{KEY_ENTER, read_key_blocking};
use crate::boot::chain;
use crate::vfs::{FileEntry, Vfs};

/// Rows of entries shown at once.
const VISIBLE_ROWS: usize = 18;

enum Level {
    Partitions,
    Directory { partition: usize, stack: Vec<String> },
}

pub fn run(vfs: &mut Vfs) {
    let partitions: Vec<Handle> = match boot::locate_handle_buffer(SearchType::from_proto::<
        SimpleFileSystem,
    >()) {
        Ok(handles) => handles.iter().copied().collect(),
        Err(_) => Vec::new(),
    };

    if partitions.is_empty() {
        uefi::system::with_stdout(|out| {
            let _ = out.clear();
            let _ = writeln!(out, "  No firmware-readable partitions. Press any key.");
        });
        read_key_blocking();
        return;
    }

    let mut level = Level::Partitions;
    let mut selected = 0usize;

    loop {
        let rows = match &level {
            Level::Partitions => partitions
                .iter()
                .enumerate()
                .map(|(i, _)| format!("Partition {}", i + 1))
                .collect::<Vec<_>>(),
            Level::Directory { partition, stack } => {
                let mut rows = Vec::new();
                rows.push(String::from(".."));
                match vfs.list_directory(partitions[*partition], &join_path(stack)) {
                    Ok(entries) => {
                        for FileEntry { name, is_dir, size } in entries {
                            rows.push(if is_dir {
                                format!("{name}\\")
                            } else {
                                format!("{name}  ({size} bytes)")
                            });
                        }
                    }
                    Err(_) => rows.push(String::from("<unreadable directory>")),
                }
                rows
            }
        };
        selected = selected.min(rows.len().saturating_sub(1));

        draw(&level, &rows, selected);

        match read_key_blocking() {
            Key::Special(ScanCode::UP) => selected = selected.saturating_sub(1),
            Key::Special(ScanCode::DOWN) => {
                if selected + 1 < rows.len() {
                    selected += 1;
                }
            }
            Key::Special(ScanCode::ESCAPE) => match level {
                Level::Partitions => return,
                Level::Directory { .. } => {
                    level = Level::Partitions;
                    selected = 0;
                }
            },
            Key::Printable(c) if u16::from(c) == KEY_ENTER => {
                let mut next: Option<Level> = None;

                match &mut level {
                    Level::Partitions => {
                        next = Some(Level::Directory {
                            partition: selected,
                            stack: Vec::new(),
                        });
                        selected = 0;
                    }
                    Level::Directory { partition, stack } => {
                        if selected == 0 {
                            // ".."
                            if stack.pop().is_none() {
                                next = Some(Level::Partitions);
                            }
                            selected = 0;
                        } else if let Some(dir) = rows[selected].strip_suffix('\\') {
                            stack.push(String::from(dir));
                            selected = 0;
                        } else if let Some(name) = rows[selected].split("  (").next() {
                            if name.to_ascii_lowercase().ends_with(".efi") {
                                let mut path = join_path(stack);
                                if path != "\\" {
                                    path.push('\\');
                                }
                                path.push_str(name);
                                let handle = partitions[*partition];

                                uefi::system::with_stdout(|out| {
                                    let _ = out.clear();
                                });
                                chain::chainload_file(handle, &path, vfs);
                                uefi::system::with_stdout(|out| {
                                    let _ = writeln!(out, "\n  Press any key to continue.");
                                });
                                read_key_blocking();
                            }
                        }
                    }
                }

                if let Some(next) = next {
                    level = next;
                }
            }
            _ => {}
        }
    }
}

fn join_path(stack: &[String]) -> String {
    if stack.is_empty() {
        String::from("\\")
    } else {
        format!("\\{}", stack.join("\\"))
    }
}

fn draw(level: &Level, rows: &[String], selected: usize) {
    let scroll = selected.saturating_sub(VISIBLE_ROWS - 1);

    uefi::system::with_stdout(|out| {
        let _ = out.set_color(Color::White, Color::Black);
        let _ = out.clear();
        let _ = writeln!(out);
        match level {
            Level::Partitions => {
                let _ = writeln!(out, "  File browser — select a partition");
            }
            Level::Directory { partition, stack } => {
                let _ = writeln!(
                    out,
                    "  File browser — partition {} {}",
                    partition + 1,
                    join_path(stack)
                );
            }
        }
        let _ = writeln!(out);

        for (i, row) in rows.iter().enumerate().skip(scroll).take(VISIBLE_ROWS) {
            if i == selected {
                let _ = out.set_color(Color::White, Color::Blue);
            } else {
                let _ = out.set_color(Color::LightGray, Color::Black);
            }
            let _ = writeln!(out, "  {row:<70}");
        }

        let _ = out.set_color(Color::DarkGray, Color::Black);
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "  [Enter] Open / launch .efi  [Esc] Back  Up/Down to select"
        );
        let _ = out.set_color(Color::White, Color::Black);
    });
}
