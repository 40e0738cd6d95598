/// Flash sector size; every partition offset and size is a multiple of it.
pub const ALIGNMENT: u32 = 0x1000;

/// Rounds `n` up to the next multiple of `unit`.
///
/// Panics on overflow in debug builds, use [`checked_align_up`] when `n` comes
/// from outside.
#[inline]
pub const fn align_up(n: u32, unit: u32) -> u32 {
    match n % unit {
        0 => n,
        rem => n + (unit - rem),
    }
}

#[inline]
pub const fn checked_align_up(n: u32, unit: u32) -> Option<u32> {
    match n % unit {
        0 => Some(n),
        rem => n.checked_add(unit - rem),
    }
}

#[inline]
pub const fn align_down(n: u32, unit: u32) -> u32 {
    n - n % unit
}

#[inline]
pub const fn is_aligned(n: u32, unit: u32) -> bool {
    n % unit == 0
}
