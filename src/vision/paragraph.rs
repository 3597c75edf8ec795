//! Paragraph grouping of recognized text lines
//!
//! Lines are merged into a paragraph when they fall within the paragraph's
//! box grown by `x_ths` / `y_ths` mean line heights. Inside a paragraph the
//! lines are read top to bottom, left to right.

/// A recognized line with its bounding box (x, y, width, height)
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub bounds: (u32, u32, u32, u32),
}

impl TextLine {
    pub fn new(text: impl Into<String>, bounds: (u32, u32, u32, u32)) -> Self {
        Self {
            text: text.into(),
            bounds,
        }
    }
}

#[derive(Debug)]
struct Member<'a> {
    text: &'a str,
    min_x: f32,
    max_x: f32,
    min_y: f32,
    max_y: f32,
    height: f32,
    center_y: f32,
    /// 0 = not yet assigned
    group: usize,
}

impl<'a> From<&'a TextLine> for Member<'a> {
    fn from(line: &'a TextLine) -> Self {
        let (x, y, w, h) = line.bounds;
        let (min_x, min_y) = (x as f32, y as f32);
        let (max_x, max_y) = ((x + w) as f32, (y + h) as f32);
        Self {
            text: &line.text,
            min_x,
            max_x,
            min_y,
            max_y,
            height: h as f32,
            center_y: 0.5 * (min_y + max_y),
            group: 0,
        }
    }
}

fn mean_height(members: &[&Member]) -> f32 {
    members.iter().map(|m| m.height).sum::<f32>() / members.len() as f32
}

/// Group lines into paragraphs, in the order paragraphs are discovered
/// from the input line order.
pub fn group_paragraphs(lines: &[TextLine], x_ths: f32, y_ths: f32) -> Vec<String> {
    let mut members: Vec<Member> = lines.iter().map(Member::from).collect();
    let mut current = 1usize;

    while members.iter().any(|m| m.group == 0) {
        let in_group: Vec<&Member> = members.iter().filter(|m| m.group == current).collect();

        if in_group.is_empty() {
            if let Some(first) = members.iter_mut().find(|m| m.group == 0) {
                first.group = current;
            }
            continue;
        }

        let mean_h = mean_height(&in_group);
        let min_gx = in_group.iter().map(|m| m.min_x).fold(f32::INFINITY, f32::min) - x_ths * mean_h;
        let max_gx = in_group.iter().map(|m| m.max_x).fold(f32::NEG_INFINITY, f32::max) + x_ths * mean_h;
        let min_gy = in_group.iter().map(|m| m.min_y).fold(f32::INFINITY, f32::min) - y_ths * mean_h;
        let max_gy = in_group.iter().map(|m| m.max_y).fold(f32::NEG_INFINITY, f32::max) + y_ths * mean_h;

        let within_x = |v: f32| min_gx <= v && v <= max_gx;
        let within_y = |v: f32| min_gy <= v && v <= max_gy;

        let candidate = members.iter().position(|m| {
            m.group == 0
                && (within_x(m.min_x) || within_x(m.max_x))
                && (within_y(m.min_y) || within_y(m.max_y))
        });

        match candidate {
            Some(idx) => members[idx].group = current,
            None => current += 1,
        }
    }

    let mut paragraphs = Vec::new();
    for group in 1..=current {
        let mut remaining: Vec<&Member> = members.iter().filter(|m| m.group == group).collect();
        if remaining.is_empty() {
            continue;
        }
        let mean_h = mean_height(&remaining);

        let mut parts = Vec::with_capacity(remaining.len());
        while !remaining.is_empty() {
            let highest = remaining.iter().map(|m| m.center_y).fold(f32::INFINITY, f32::min);
            let row_limit = highest + 0.4 * mean_h;
            let most_left = remaining
                .iter()
                .filter(|m| m.center_y < row_limit)
                .map(|m| m.min_x)
                .fold(f32::INFINITY, f32::min);

            let Some(idx) = remaining
                .iter()
                .rposition(|m| m.center_y < row_limit && m.min_x == most_left)
            else {
                break;
            };
            parts.push(remaining.remove(idx).text);
        }

        paragraphs.push(parts.join(" "));
    }

    paragraphs
}
