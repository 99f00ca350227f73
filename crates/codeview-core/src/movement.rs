//! Horizontal cursor movement within a line, logical and visual.
//!
//! Lines are treated as a single visual row; wrapping is a rendering concern.

use crate::bidi::{BidiSpan, Direction, part_at};
use crate::pos::{Pos, Sticky, byte_offset, char_len};
use unicode_segmentation::GraphemeCursor;

/// Direction of a horizontal move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDir {
    /// Towards the start (logical) or the left (visual).
    Backward,
    /// Towards the end (logical) or the right (visual).
    Forward,
}

impl MoveDir {
    /// The opposite direction.
    pub fn reverse(self) -> Self {
        match self {
            MoveDir::Backward => MoveDir::Forward,
            MoveDir::Forward => MoveDir::Backward,
        }
    }

    fn is_back(self) -> bool {
        self == MoveDir::Backward
    }
}

fn char_offset(text: &str, byte: usize) -> usize {
    if text.is_ascii() {
        byte
    } else {
        char_len(&text[..byte])
    }
}

/// Next grapheme boundary from char offset `ch` in direction `dir`, or `None` at the line edge.
pub fn move_char_logically(text: &str, ch: usize, dir: MoveDir) -> Option<usize> {
    let byte = byte_offset(text, ch);
    let mut cursor = GraphemeCursor::new(byte, text.len(), true);
    let target = match dir {
        MoveDir::Forward => cursor.next_boundary(text, 0),
        MoveDir::Backward => cursor.prev_boundary(text, 0),
    }
    .ok()
    .flatten()?;
    Some(char_offset(text, target))
}

/// Move `start` by one grapheme in storage order.
pub fn move_logically(text: &str, start: Pos, dir: MoveDir) -> Option<Pos> {
    let ch = move_char_logically(text, start.ch, dir)?;
    let sticky = if dir.is_back() {
        Sticky::After
    } else {
        Sticky::Before
    };
    Some(Pos::with_sticky(start.line, ch, sticky))
}

/// The position a cursor lands on when it enters line `line` while moving in `dir`.
///
/// Moving forward enters at the start (the left edge when `visually`), moving backward at the
/// end.
pub fn end_of_line(
    text: &str,
    order: Option<&[BidiSpan]>,
    direction: Direction,
    line: usize,
    dir: MoveDir,
    visually: bool,
) -> Pos {
    let mut dir = dir;
    if visually {
        if direction == Direction::Rtl {
            dir = dir.reverse();
        }
        let part = order.and_then(|order| {
            if dir.is_back() {
                order.last()
            } else {
                order.first()
            }
        });
        if let Some(part) = part {
            let in_storage_order = dir.is_back() == (part.level == 1);
            let sticky = if in_storage_order {
                Sticky::After
            } else {
                Sticky::Before
            };
            let ch = if part.level > 0 || direction == Direction::Rtl {
                let ch = if in_storage_order {
                    part.from
                } else {
                    part.to.saturating_sub(1)
                };
                if sticky == Sticky::Before {
                    move_char_logically(text, ch, MoveDir::Forward).unwrap_or(part.to)
                } else {
                    ch
                }
            } else if dir.is_back() {
                part.to
            } else {
                part.from
            };
            return Pos::with_sticky(line, ch, sticky);
        }
    }
    if dir.is_back() {
        Pos::with_sticky(line, char_len(text), Sticky::Before)
    } else {
        Pos::with_sticky(line, 0, Sticky::After)
    }
}

/// Move `start` one grapheme to the left or right on screen.
///
/// Returns `None` when there is nowhere to go on this line.
pub fn move_visually(
    text: &str,
    order: Option<&[BidiSpan]>,
    direction: Direction,
    start: Pos,
    dir: MoveDir,
) -> Option<Pos> {
    let Some(bidi) = order else {
        return move_logically(text, start, dir);
    };
    let len = char_len(text);
    let mut start = start;
    if start.ch >= len {
        start.ch = len;
        start.sticky = Some(Sticky::Before);
    } else if start.ch == 0 {
        start.sticky = Some(Sticky::After);
    }
    let part_pos = part_at(bidi, start.ch, start.sticky)?.index;
    let part = bidi[part_pos];
    let forward = !dir.is_back();

    if direction == Direction::Ltr
        && part.level % 2 == 0
        && (if forward {
            part.to > start.ch
        } else {
            part.from < start.ch
        })
    {
        // Inside a left-to-right run of a left-to-right line.
        return move_logically(text, start, dir);
    }

    let mv = |pos: usize, d: MoveDir| move_char_logically(text, pos, d);

    if direction == Direction::Rtl || part.level == 1 {
        let in_storage_order = (part.level == 1) == dir.is_back();
        let step = if in_storage_order {
            MoveDir::Forward
        } else {
            MoveDir::Backward
        };
        if let Some(ch) = mv(start.ch, step) {
            let inside = if in_storage_order {
                ch <= part.to
            } else {
                ch >= part.from
            };
            if inside {
                let sticky = if in_storage_order {
                    Sticky::Before
                } else {
                    Sticky::After
                };
                return Some(Pos::with_sticky(start.line, ch, sticky));
            }
        }
    }

    // Leave the current run for the visually adjacent one.
    let result = |ch: usize, in_storage_order: bool| {
        if in_storage_order {
            mv(ch, MoveDir::Forward).map(|ch| Pos::with_sticky(start.line, ch, Sticky::Before))
        } else {
            Some(Pos::with_sticky(start.line, ch, Sticky::After))
        }
    };
    let mut index = part_pos;
    loop {
        index = if forward {
            index.checked_add(1).filter(|&i| i < bidi.len())?
        } else {
            index.checked_sub(1)?
        };
        let part = bidi[index];
        let in_storage_order = forward == (part.level != 1);
        let edge = if in_storage_order {
            Some(0)
        } else {
            mv(len, MoveDir::Backward)
        };
        if let Some(ch) = edge.filter(|&ch| part.from <= ch && ch < part.to) {
            return result(ch, in_storage_order);
        }
        let ch = if in_storage_order {
            Some(part.from)
        } else {
            mv(part.to, MoveDir::Backward)
        };
        if let Some(ch) = ch.filter(|&ch| ch < len) {
            return result(ch, in_storage_order);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bidi::bidi_ordering;

    #[test]
    fn test_grapheme_clusters_move_as_one() {
        let text = "e\u{301}x";
        assert_eq!(move_char_logically(text, 0, MoveDir::Forward), Some(2));
        assert_eq!(move_char_logically(text, 2, MoveDir::Backward), Some(0));
        assert_eq!(move_char_logically(text, 3, MoveDir::Forward), None);
        assert_eq!(move_char_logically(text, 0, MoveDir::Backward), None);
    }

    #[test]
    fn test_logical_move_sets_sticky() {
        let pos = move_logically("abc", Pos::new(4, 1), MoveDir::Forward).unwrap();
        assert!(pos.same_cursor(&Pos::with_sticky(4, 2, Sticky::Before)));
        let pos = move_logically("abc", Pos::new(4, 1), MoveDir::Backward).unwrap();
        assert!(pos.same_cursor(&Pos::with_sticky(4, 0, Sticky::After)));
    }

    #[test]
    fn test_visual_move_through_rtl_run() {
        let text = "abc\u{5d0}\u{5d1}\u{5d2}";
        let order = bidi_ordering(text, Direction::Ltr).unwrap();
        let order = Some(order.as_slice());

        // Inside the left-to-right run moves are logical.
        let next = move_visually(text, order, Direction::Ltr, Pos::new(0, 1), MoveDir::Forward);
        assert_eq!(next.map(|p| p.ch), Some(2));

        // From the start of the RTL run, moving left walks it in storage order.
        let start = Pos::with_sticky(0, 3, Sticky::After);
        let left = move_visually(text, order, Direction::Ltr, start, MoveDir::Backward).unwrap();
        assert!(left.same_cursor(&Pos::with_sticky(0, 4, Sticky::Before)));

        // Its visual right edge is the end of the line.
        assert_eq!(
            move_visually(text, order, Direction::Ltr, start, MoveDir::Forward),
            None
        );
    }

    #[test]
    fn test_end_of_line_plain() {
        let start = end_of_line("hello", None, Direction::Ltr, 3, MoveDir::Forward, true);
        assert!(start.same_cursor(&Pos::with_sticky(3, 0, Sticky::After)));
        let end = end_of_line("hello", None, Direction::Ltr, 3, MoveDir::Backward, false);
        assert!(end.same_cursor(&Pos::with_sticky(3, 5, Sticky::Before)));
    }
}
