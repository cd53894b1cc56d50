//! Button payloads: `prefix::token[::extra]`.

use std::str::FromStr;

use super::{SelectionError, SelectionToken};

const SEPARATOR: &str = "::";

/// Every action a button can trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// `t::token`: show details for a catalog title.
    PickTitle(SelectionToken),
    /// `xs::token`: search the index with a title's query list.
    ShowOptions(SelectionToken),
    /// `rq::token`: release group chosen, offer qualities.
    Group(SelectionToken),
    /// `qu::token`: quality chosen, offer audio or list items.
    Quality(SelectionToken),
    /// `ra::token`: audio track chosen, list items.
    Audio(SelectionToken),
    /// `rp::token::page`: page navigation.
    Page { token: SelectionToken, page: usize },
    /// `rm::token`: item chosen, ask for confirmation.
    Item(SelectionToken),
    /// `dl::token`: download confirmed.
    Confirm(SelectionToken),
    /// `cancel_dl`
    Cancel,
    /// `info`: explain the bundle marker.
    Info,
}

impl CallbackAction {
    pub fn prefix(&self) -> &'static str {
        match self {
            CallbackAction::PickTitle(_) => "t",
            CallbackAction::ShowOptions(_) => "xs",
            CallbackAction::Group(_) => "rq",
            CallbackAction::Quality(_) => "qu",
            CallbackAction::Audio(_) => "ra",
            CallbackAction::Page { .. } => "rp",
            CallbackAction::Item(_) => "rm",
            CallbackAction::Confirm(_) => "dl",
            CallbackAction::Cancel => "cancel_dl",
            CallbackAction::Info => "info",
        }
    }

    /// Encode as button payload.
    pub fn to_data(&self) -> String {
        match self {
            CallbackAction::PickTitle(t)
            | CallbackAction::ShowOptions(t)
            | CallbackAction::Group(t)
            | CallbackAction::Quality(t)
            | CallbackAction::Audio(t)
            | CallbackAction::Item(t)
            | CallbackAction::Confirm(t) => format!("{}{}{}", self.prefix(), SEPARATOR, t),
            CallbackAction::Page { token, page } => {
                format!("{}{}{}{}{}", self.prefix(), SEPARATOR, token, SEPARATOR, page)
            }
            CallbackAction::Cancel | CallbackAction::Info => self.prefix().to_string(),
        }
    }
}

impl FromStr for CallbackAction {
    type Err = SelectionError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut parts = data.split(SEPARATOR);
        let prefix = parts.next().unwrap_or_default();

        let token = |part: Option<&str>| -> Result<SelectionToken, SelectionError> {
            part.ok_or_else(|| SelectionError::InvalidCallback(data.to_string()))?
                .parse()
                .map_err(|_| SelectionError::InvalidCallback(data.to_string()))
        };

        let action = match prefix {
            "t" => CallbackAction::PickTitle(token(parts.next())?),
            "xs" => CallbackAction::ShowOptions(token(parts.next())?),
            "rq" => CallbackAction::Group(token(parts.next())?),
            "qu" => CallbackAction::Quality(token(parts.next())?),
            "ra" => CallbackAction::Audio(token(parts.next())?),
            "rp" => {
                let token = token(parts.next())?;
                // A garbled page number falls back to the first page
                let page = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
                CallbackAction::Page { token, page }
            }
            "rm" => CallbackAction::Item(token(parts.next())?),
            "dl" => CallbackAction::Confirm(token(parts.next())?),
            "cancel_dl" => CallbackAction::Cancel,
            "info" => CallbackAction::Info,
            _ => return Err(SelectionError::InvalidCallback(data.to_string())),
        };

        Ok(action)
    }
}
