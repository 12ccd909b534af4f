//! Element location strategies
//!
//! A [`Selector`] names one lookup strategy; a [`Locator`] chains selectors
//! so that later links only match inside earlier ones. The chain is sent to
//! the browser driver as data, which keeps element resolution in one place
//! instead of scattering selector strings through every test.

use serde::{Deserialize, Serialize};

/// One element lookup strategy.
///
/// Text strategies match on containment, not equality, following how the
/// underlying browser locators behave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selector {
    /// CSS selector (e.g. ".ticket-card")
    Css { value: String },
    /// Element containing the given text
    Text { value: String },
    /// CSS selector filtered by contained text
    CssWithText { css: String, text: String },
    /// ARIA role, optionally filtered by accessible name
    Role { role: String, name: Option<String> },
    /// Form control by associated label text
    Label { value: String },
    /// Input by placeholder text
    Placeholder { value: String },
    /// Element by data-testid attribute
    TestId { value: String },
}

impl Selector {
    pub fn css(value: impl Into<String>) -> Self {
        Self::Css {
            value: value.into(),
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Text {
            value: value.into(),
        }
    }

    pub fn css_with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self::CssWithText {
            css: css.into(),
            text: text.into(),
        }
    }

    pub fn role(role: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: None,
        }
    }

    pub fn role_with_name(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: Some(name.into()),
        }
    }

    pub fn label(value: impl Into<String>) -> Self {
        Self::Label {
            value: value.into(),
        }
    }

    pub fn placeholder(value: impl Into<String>) -> Self {
        Self::Placeholder {
            value: value.into(),
        }
    }

    pub fn test_id(value: impl Into<String>) -> Self {
        Self::TestId {
            value: value.into(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Selector::Css { value } => format!("css={}", value),
            Selector::Text { value } => format!("text~={}", value),
            Selector::CssWithText { css, text } => format!("css={} text~={}", css, text),
            Selector::Role { role, name: Some(name) } => format!("role={}[name~={}]", role, name),
            Selector::Role { role, name: None } => format!("role={}", role),
            Selector::Label { value } => format!("label~={}", value),
            Selector::Placeholder { value } => format!("placeholder~={}", value),
            Selector::TestId { value } => format!("testid={}", value),
        }
    }
}

/// One link in a locator chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Link {
    #[serde(flatten)]
    selector: Selector,
    #[serde(skip_serializing_if = "Option::is_none")]
    nth: Option<usize>,
}

/// A scoped element lookup.
///
/// `Locator::new(a).descendant(b)` matches elements satisfying `b` inside
/// elements satisfying `a`. That scoping is what makes "the card titled X in
/// the Blocked column" unambiguous even when the same title exists elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator {
    chain: Vec<Link>,
}

impl Locator {
    pub fn new(selector: Selector) -> Self {
        Self {
            chain: vec![Link {
                selector,
                nth: None,
            }],
        }
    }

    /// Narrow the match to descendants of the current match.
    pub fn descendant(mut self, selector: Selector) -> Self {
        self.chain.push(Link {
            selector,
            nth: None,
        });
        self
    }

    /// Pick one element when the last link matches several.
    pub fn nth(mut self, index: usize) -> Self {
        if let Some(link) = self.chain.last_mut() {
            link.nth = Some(index);
        }
        self
    }

    pub fn first(self) -> Self {
        self.nth(0)
    }

    /// Human-readable form for error messages
    pub fn describe(&self) -> String {
        self.chain
            .iter()
            .map(|link| match link.nth {
                Some(n) => format!("{}#{}", link.selector.describe(), n),
                None => link.selector.describe(),
            })
            .collect::<Vec<_>>()
            .join(" >> ")
    }
}

impl From<Selector> for Locator {
    fn from(selector: Selector) -> Self {
        Locator::new(selector)
    }
}

/// A page coordinate in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An element's layout box, as reported by the browser
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_serializes_with_kind_tag() {
        let json = serde_json::to_value(Selector::css(".column")).unwrap();
        assert_eq!(json["kind"], "css");
        assert_eq!(json["value"], ".column");

        let json = serde_json::to_value(Selector::role_with_name("button", "Save")).unwrap();
        assert_eq!(json["kind"], "role");
        assert_eq!(json["role"], "button");
        assert_eq!(json["name"], "Save");
    }

    // The driver script dispatches on these exact strings; a renamed tag
    // here breaks every lookup of that strategy.
    #[test]
    fn every_strategy_keeps_its_wire_tag() {
        let tags = [
            (Selector::css(".x"), "css"),
            (Selector::text("x"), "text"),
            (Selector::css_with_text(".x", "y"), "css_with_text"),
            (Selector::role("alert"), "role"),
            (Selector::label("Name"), "label"),
            (Selector::placeholder("Board name"), "placeholder"),
            (Selector::test_id("board"), "test_id"),
        ];
        for (selector, expected) in tags {
            let json = serde_json::to_value(&selector).unwrap();
            assert_eq!(json["kind"], expected, "{:?}", selector);
        }
    }

    #[test]
    fn chain_serializes_as_flat_array() {
        let locator = Locator::new(Selector::css_with_text(".column", "Blocked"))
            .descendant(Selector::css_with_text(".ticket-card", "Fix login"))
            .first();
        let json = serde_json::to_value(&locator).unwrap();

        let chain = json.as_array().unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0]["kind"], "css_with_text");
        assert_eq!(chain[0]["text"], "Blocked");
        assert!(chain[0].get("nth").is_none());
        assert_eq!(chain[1]["nth"], 0);
    }

    #[test]
    fn describe_reads_left_to_right() {
        let locator = Locator::new(Selector::css(".column"))
            .descendant(Selector::text("Fix login"));
        assert_eq!(locator.describe(), "css=.column >> text~=Fix login");
    }

    #[test]
    fn bounding_box_center_and_containment() {
        let bbox = BoundingBox {
            x: 100.0,
            y: 200.0,
            width: 50.0,
            height: 30.0,
        };
        let center = bbox.center();
        assert_eq!(center, Point::new(125.0, 215.0));
        assert!(bbox.contains(center));
        assert!(!bbox.contains(Point::new(99.0, 215.0)));
    }
}
