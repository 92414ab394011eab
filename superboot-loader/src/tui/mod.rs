pub mod explorer;
pub mod menu;

use uefi::proto::console::text::Key;

/// Key codes shared by the menu and the browser.
pub(crate) const KEY_ENTER: u16 = 0x000D;
pub(crate) const KEY_BACKSPACE: u16 = 0x0008;

/// Block until a key arrives.
pub(crate) fn read_key_blocking() -> Key {
    loop {
        if let Ok(Some(key)) = uefi::system::with_stdin(|stdin| stdin.read_key()) {
            return key;
        }
        uefi::boot::stall(10_000);
    }
}
