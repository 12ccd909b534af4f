//! Accessibility assertions
//!
//! These treat ARIA wiring as a correctness requirement rather than a
//! nicety: an error message a screen reader cannot find is an error
//! message that does not exist.

use tracing::debug;

use crate::error::{Error, Result};
use crate::locator::{Locator, Selector};
use crate::session::Session;
use crate::wait::{wait_until, WaitOptions};

/// Wait for a `role="alert"` element and return its text.
pub async fn expect_alert(session: &Session) -> Result<String> {
    let alert = Locator::new(Selector::role("alert"));
    session.wait_for(&alert).await?;
    let text = session.text(&alert.first()).await?;
    if text.trim().is_empty() {
        return Err(Error::Assertion(
            "alert region is visible but empty".to_string(),
        ));
    }
    debug!(alert = %text.trim(), "alert shown");
    Ok(text.trim().to_string())
}

/// Wait for a `role="dialog"` element to be visible.
pub async fn expect_dialog(session: &Session) -> Result<()> {
    session
        .wait_for(&Locator::new(Selector::role("dialog")))
        .await
}

/// Assert the page declares at least one `aria-live` region.
pub async fn expect_live_region(session: &Session) -> Result<()> {
    let regions = Locator::new(Selector::css("[aria-live]"));
    let n = session.count(&regions).await?;
    if n == 0 {
        return Err(Error::Assertion(
            "no aria-live region on the page".to_string(),
        ));
    }
    Ok(())
}

/// Assert a form field is flagged invalid with a properly associated,
/// visible, non-empty error message. Returns the message text.
///
/// Checks the whole chain: `aria-invalid="true"` on the field,
/// `aria-describedby` naming an element, and that element being visible
/// with content. Any broken link fails the assertion.
pub async fn expect_invalid_field(session: &Session, field: &Locator) -> Result<String> {
    let opts = WaitOptions::new(session.timeouts().element)
        .with_interval(session.timeouts().poll_interval);
    wait_until("field flagged aria-invalid", &opts, || async move {
        let flag = session.attr(field, "aria-invalid").await?;
        Ok((flag.as_deref() == Some("true")).then_some(()))
    })
    .await?;

    let described_by = session
        .attr(field, "aria-describedby")
        .await?
        .ok_or_else(|| {
            Error::Assertion(
                "field is aria-invalid but has no aria-describedby association".to_string(),
            )
        })?;
    let message_id = described_by
        .split_whitespace()
        .next()
        .ok_or_else(|| Error::Assertion("aria-describedby is empty".to_string()))?
        .to_string();

    let message = Locator::new(Selector::css(format!("[id={:?}]", message_id)));
    session.wait_for(&message).await?;
    let text = session.text(&message).await?;
    if text.trim().is_empty() {
        return Err(Error::Assertion(format!(
            "error element #{} is visible but empty",
            message_id
        )));
    }
    debug!(field_error = %text.trim(), "field error associated");
    Ok(text.trim().to_string())
}
