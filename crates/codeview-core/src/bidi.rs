//! Bidirectional text ordering.
//!
//! A simplified implementation of the Unicode bidi algorithm (no explicit embeddings) that is
//! good enough to place cursors and draw selections in mixed left-to-right / right-to-left
//! lines. It resolves weak types (W1-W7) and neutrals (N1-N2), then builds the visual order of
//! runs directly from the three possible levels: 0 (LTR), 1 (RTL) and 2 (numbers inside RTL).

use crate::pos::Sticky;
use serde::{Deserialize, Serialize};

/// Base direction of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Left to right.
    #[default]
    Ltr,
    /// Right to left.
    Rtl,
}

/// A run of characters `from..to` (char offsets) displayed at one embedding level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BidiSpan {
    /// Start offset.
    pub from: usize,
    /// End offset (exclusive).
    pub to: usize,
    /// 0 = LTR, 1 = RTL, 2 = number inside RTL.
    pub level: u8,
}

impl BidiSpan {
    fn new(level: u8, from: usize, to: usize) -> Self {
        Self { from, to, level }
    }
}

/// Types of code points 0x00..=0xf7.
const LOW_TYPES: &[u8] = b"bbbbbbbbbtstwsbbbbbbbbbbbbbbssstwNN%%%NNNNNN,N,N1111111111NNNNNNNLLLLLLLLLLLLLLLLLLLLLLLLLLNNNNNNLLLLLLLLLLLLLLLLLLLLLLLLLLNNNNbbbbbbsbbbbbbbbbbbbbbbbbbbbbbbbbb,N%%%%NNNNLNNNNN%%11NLNNN1LNNNNNLLLLLLLLLLLLLLLLLLLLLLLNLLLLLLLLLLLLLLLLLLLLLLLLLLLLLLLN";

/// Types of code points 0x600..=0x6f9.
const ARABIC_TYPES: &[u8] = b"nnnnnnNNr%%r,rNNmmmmmmmmmmmrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrmmmmmmmmmmmmmmmmmmmmmnnnnnnnnnn%nnrrrmrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrmmmmmmmnNmmmmmmrrmmNmmmmrr1111111111";

// Type letters: L (left), R (right), r (Arabic letter), 1 (European number), n (Arabic
// number), % (terminator), , (separator), m (non-spacing mark), b (boundary neutral),
// s/t/w (paragraph/segment separator, whitespace), N (other neutral).
fn char_type(ch: char) -> u8 {
    let code = ch as u32;
    match code {
        0..=0xf7 => LOW_TYPES[code as usize],
        0x590..=0x5f4 => b'R',
        0x600..=0x6f9 => ARABIC_TYPES[(code - 0x600) as usize],
        0x6fa..=0x8ac => b'r',
        0x2000..=0x200b => b'w',
        0x200c => b'b',
        _ => b'L',
    }
}

fn has_rtl(text: &str) -> bool {
    text.chars()
        .any(|c| matches!(c as u32, 0x590..=0x5f4 | 0x600..=0x6ff | 0x700..=0x8ac))
}

fn is_neutral(t: u8) -> bool {
    matches!(t, b's' | b't' | b'w' | b'N')
}

fn is_strong(t: u8) -> bool {
    matches!(t, b'L' | b'R' | b'r')
}

fn counts_as_left(t: u8) -> bool {
    matches!(t, b'L' | b'b' | b'1' | b'n')
}

fn counts_as_num(t: u8) -> bool {
    matches!(t, b'1' | b'n')
}

/// Compute the visual order of `text`.
///
/// Returns `None` when no reordering is needed (empty text, or LTR text in an LTR base).
/// Offsets are char offsets; the runs are listed in visual order.
pub fn bidi_ordering(text: &str, direction: Direction) -> Option<Vec<BidiSpan>> {
    if text.is_empty() || (direction == Direction::Ltr && !has_rtl(text)) {
        return None;
    }
    let outer = match direction {
        Direction::Ltr => b'L',
        Direction::Rtl => b'R',
    };
    let mut types: Vec<u8> = text.chars().map(char_type).collect();
    let len = types.len();

    // W1: marks take the type of the previous char.
    let mut prev = outer;
    for t in types.iter_mut() {
        if *t == b'm' {
            *t = prev;
        } else {
            prev = *t;
        }
    }

    // W2: numbers after an Arabic letter become Arabic numbers. W3: Arabic letters become R.
    let mut cur = outer;
    for t in types.iter_mut() {
        if *t == b'1' && cur == b'r' {
            *t = b'n';
        } else if is_strong(*t) {
            cur = *t;
            if *t == b'r' {
                *t = b'R';
            }
        }
    }

    // W4: a single separator between two numbers of the same type joins them.
    if len > 2 {
        let mut prev = types[0];
        for i in 1..len - 1 {
            let t = types[i];
            if t == b'+' && prev == b'1' && types[i + 1] == b'1' {
                types[i] = b'1';
            } else if t == b',' && prev == types[i + 1] && (prev == b'1' || prev == b'n') {
                types[i] = prev;
            }
            prev = t;
        }
    }

    // W5: terminators next to European numbers become numbers. W6: other separators and
    // terminators become neutral.
    let mut i = 0;
    while i < len {
        match types[i] {
            b',' => types[i] = b'N',
            b'%' => {
                let mut end = i + 1;
                while end < len && types[end] == b'%' {
                    end += 1;
                }
                let replace = if (i > 0 && types[i - 1] == b'1') || (end < len && types[end] == b'1')
                {
                    b'1'
                } else {
                    b'N'
                };
                types[i..end].fill(replace);
                i = end - 1;
            }
            _ => {}
        }
        i += 1;
    }

    // W7: European numbers after L become L.
    let mut cur = outer;
    for t in types.iter_mut() {
        if cur == b'L' && *t == b'1' {
            *t = b'L';
        } else if is_strong(*t) {
            cur = *t;
        }
    }

    // N1/N2: neutrals between equal directions take that direction, others the base.
    let mut i = 0;
    while i < len {
        if is_neutral(types[i]) {
            let mut end = i + 1;
            while end < len && is_neutral(types[end]) {
                end += 1;
            }
            let before = (if i > 0 { types[i - 1] } else { outer }) == b'L';
            let after = (if end < len { types[end] } else { outer }) == b'L';
            let replace = if before == after {
                if before { b'L' } else { b'R' }
            } else {
                outer
            };
            types[i..end].fill(replace);
            i = end;
        } else {
            i += 1;
        }
    }

    let rtl = direction == Direction::Rtl;
    let mut order: Vec<BidiSpan> = Vec::new();
    let mut i = 0;
    while i < len {
        if counts_as_left(types[i]) {
            let start = i;
            i += 1;
            while i < len && counts_as_left(types[i]) {
                i += 1;
            }
            order.push(BidiSpan::new(0, start, i));
        } else {
            let mut pos = i;
            let mut at = order.len();
            i += 1;
            while i < len && types[i] != b'L' {
                i += 1;
            }
            let mut j = pos;
            while j < i {
                if counts_as_num(types[j]) {
                    if pos < j {
                        order.insert(at, BidiSpan::new(1, pos, j));
                        if rtl {
                            at += 1;
                        }
                    }
                    let nstart = j;
                    j += 1;
                    while j < i && counts_as_num(types[j]) {
                        j += 1;
                    }
                    order.insert(at, BidiSpan::new(2, nstart, j));
                    if rtl {
                        at += 1;
                    }
                    pos = j;
                } else {
                    j += 1;
                }
            }
            if pos < i {
                order.insert(at, BidiSpan::new(1, pos, i));
            }
        }
    }

    if direction == Direction::Ltr {
        let leading = text.chars().take_while(|c| c.is_whitespace()).count();
        if leading > 0 && order.first().is_some_and(|p| p.level == 1) {
            order[0].from = leading;
            order.insert(0, BidiSpan::new(0, 0, leading));
        }
        let trailing = text.chars().rev().take_while(|c| c.is_whitespace()).count();
        if trailing > 0 && order.last().is_some_and(|p| p.level == 1) {
            if let Some(last) = order.last_mut() {
                last.to -= trailing;
            }
            order.push(BidiSpan::new(0, len - trailing, len));
        }
    } else {
        order.reverse();
    }
    Some(order)
}

/// Result of [`part_at`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartAt {
    /// Index of the part the position belongs to.
    pub index: usize,
    /// The other part touching the position when it sits on a run boundary.
    pub other: Option<usize>,
}

/// Find the run containing char offset `ch`, using `sticky` to break ties at run boundaries.
pub fn part_at(order: &[BidiSpan], ch: usize, sticky: Option<Sticky>) -> Option<PartAt> {
    let before = sticky == Some(Sticky::Before);
    let mut found = None;
    let mut other = None;
    for (i, cur) in order.iter().enumerate() {
        if cur.from < ch && cur.to > ch {
            return Some(PartAt {
                index: i,
                other: None,
            });
        }
        if cur.to == ch {
            if cur.from != cur.to && before {
                found = Some(i);
            } else {
                other = Some(i);
            }
        }
        if cur.from == ch {
            if cur.from != cur.to && !before {
                found = Some(i);
            } else {
                other = Some(i);
            }
        }
    }
    match found {
        Some(index) => Some(PartAt { index, other }),
        None => other.map(|index| PartAt { index, other }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pure_ltr_needs_no_order() {
        assert_eq!(bidi_ordering("hello world", Direction::Ltr), None);
        assert_eq!(bidi_ordering("", Direction::Rtl), None);
    }

    #[test]
    fn test_ltr_then_hebrew() {
        let order = bidi_ordering("abc\u{5d0}\u{5d1}\u{5d2}", Direction::Ltr).unwrap();
        assert_eq!(
            order,
            vec![BidiSpan::new(0, 0, 3), BidiSpan::new(1, 3, 6)]
        );
    }

    #[test]
    fn test_rtl_base_reverses_runs() {
        let order = bidi_ordering("abc \u{5d0}\u{5d1}", Direction::Rtl).unwrap();
        assert_eq!(
            order,
            vec![BidiSpan::new(1, 3, 6), BidiSpan::new(0, 0, 3)]
        );
    }

    #[test]
    fn test_numbers_inside_rtl_get_level_two() {
        let order = bidi_ordering("\u{5d0} 12 \u{5d1}", Direction::Ltr).unwrap();
        assert_eq!(
            order,
            vec![
                BidiSpan::new(1, 4, 6),
                BidiSpan::new(2, 2, 4),
                BidiSpan::new(1, 0, 2),
            ]
        );
    }

    #[test]
    fn test_edge_whitespace_stays_ltr() {
        let order = bidi_ordering("  \u{5d0}\u{5d1} ", Direction::Ltr).unwrap();
        assert_eq!(
            order,
            vec![
                BidiSpan::new(0, 0, 2),
                BidiSpan::new(1, 2, 4),
                BidiSpan::new(0, 4, 5),
            ]
        );
    }

    #[test]
    fn test_part_at_boundaries() {
        let order = vec![BidiSpan::new(0, 0, 3), BidiSpan::new(1, 3, 6)];
        assert_eq!(
            part_at(&order, 1, None),
            Some(PartAt {
                index: 0,
                other: None
            })
        );
        let before = part_at(&order, 3, Some(Sticky::Before)).unwrap();
        assert_eq!(before.index, 0);
        assert_eq!(before.other, Some(1));
        let after = part_at(&order, 3, Some(Sticky::After)).unwrap();
        assert_eq!(after.index, 1);
        assert_eq!(after.other, Some(0));
    }
}
