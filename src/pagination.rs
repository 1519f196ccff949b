//! Windowed page index for list views.
//!
//! Page 1 and the last page are always shown, together with a window of
//! `sibling_count` pages on each side of the current page. Runs of hidden pages
//! collapse into a single ellipsis; a run of exactly one hidden page shows that
//! page instead.

use std::fmt;

/// Sets of at most this many pages are never truncated.
pub const MAX_UNTRUNCATED_PAGES: u32 = 7;

pub const DEFAULT_SIBLING_COUNT: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageToken {
    Page(u32),
    Ellipsis,
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageToken::Page(n) => write!(f, "{n}"),
            PageToken::Ellipsis => f.write_str("..."),
        }
    }
}

/// Page labels for a page control.
///
/// `current_page` outside `1..=total_pages` is clamped into range. The sibling
/// window keeps its full width at the edges, so page 1 of 20 shows `1 2 3 ... 20`.
pub fn generate(current_page: u32, total_pages: u32, sibling_count: u32) -> Vec<PageToken> {
    if total_pages <= MAX_UNTRUNCATED_PAGES {
        return (1..=total_pages).map(PageToken::Page).collect();
    }

    let current = current_page.clamp(1, total_pages);
    let width = sibling_count.saturating_mul(2).saturating_add(1).min(total_pages);
    let mut left = current.saturating_sub(sibling_count).max(1);
    let mut right = current.saturating_add(sibling_count).min(total_pages);
    // shift the window off the edges so it keeps its width
    if right - left + 1 < width {
        if left == 1 {
            right = width;
        } else {
            left = total_pages - width + 1;
        }
    }

    let mut shown: Vec<u32> = Vec::with_capacity(width as usize + 2);
    shown.push(1);
    shown.extend((left..=right).filter(|p| *p != 1 && *p != total_pages));
    shown.push(total_pages);

    let mut tokens = Vec::with_capacity(shown.len() + 2);
    let mut prev: Option<u32> = None;
    for page in shown {
        if let Some(prev) = prev {
            match page - prev {
                1 => {}
                2 => tokens.push(PageToken::Page(prev + 1)),
                _ => tokens.push(PageToken::Ellipsis),
            }
        }
        tokens.push(PageToken::Page(page));
        prev = Some(page);
    }
    tokens
}

/// Jump targets shown beside the page labels; `None` hides the control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageControls {
    pub first: Option<u32>,
    pub previous: Option<u32>,
    pub next: Option<u32>,
    pub last: Option<u32>,
}

pub fn page_controls(current_page: u32, total_pages: u32) -> PageControls {
    if total_pages == 0 {
        return PageControls::default();
    }
    let current = current_page.clamp(1, total_pages);
    let back = current > 1;
    let forward = current < total_pages;
    PageControls {
        first: back.then_some(1),
        previous: back.then(|| current - 1),
        next: forward.then(|| current + 1),
        last: forward.then_some(total_pages),
    }
}
