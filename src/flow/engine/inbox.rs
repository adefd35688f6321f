// SPDX-License-Identifier: MIT

//! Bounded channel from an external rendering surface into a run
//!
//! The surface keeps a [`UiSender`]; the engine drains the [`UiInbox`]
//! between waves and waits on it (with a timeout) when a block depends on an
//! InteractiveUI output that has not been delivered yet.

use crate::bdk::connector::BlockId;
use crate::bdk::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// A value reported by the surface for one block output
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UiOutput {
    pub block_id: BlockId,
    pub port: String,
    pub value: Value,
}

#[derive(Debug, Clone)]
pub struct UiSender {
    tx: mpsc::Sender<UiOutput>,
}

impl UiSender {
    /// Deposit a value, waiting for room in the inbox
    pub async fn report(
        &self,
        block_id: impl Into<BlockId>,
        port: impl Into<String>,
        value: Value,
    ) -> Result<()> {
        let output = UiOutput {
            block_id: block_id.into(),
            port: port.into(),
            value,
        };
        self.tx
            .send(output)
            .await
            .map_err(|_| FlowError::other("UI inbox closed"))
    }

    /// Deposit a value without waiting
    pub fn try_report(
        &self,
        block_id: impl Into<BlockId>,
        port: impl Into<String>,
        value: Value,
    ) -> Result<()> {
        let output = UiOutput {
            block_id: block_id.into(),
            port: port.into(),
            value,
        };
        self.tx.try_send(output).map_err(|e| match e {
            TrySendError::Full(_) => FlowError::other("UI inbox full"),
            TrySendError::Closed(_) => FlowError::other("UI inbox closed"),
        })
    }
}

#[derive(Debug)]
pub struct UiInbox {
    rx: mpsc::Receiver<UiOutput>,
}

impl UiInbox {
    pub fn channel(capacity: usize) -> (UiSender, UiInbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (UiSender { tx }, UiInbox { rx })
    }

    /// Everything deposited so far, without waiting
    pub(crate) fn drain(&mut self) -> Vec<UiOutput> {
        let mut outputs = Vec::new();
        while let Ok(output) = self.rx.try_recv() {
            outputs.push(output);
        }
        outputs
    }

    /// Next deposit, or `None` on timeout or when every sender is gone
    pub(crate) async fn recv_timeout(&mut self, wait: Duration) -> Option<UiOutput> {
        tokio::time::timeout(wait, self.rx.recv())
            .await
            .ok()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_drain_returns_pending_in_order() {
        let (sender, mut inbox) = UiInbox::channel(4);
        sender.report("ui", "onTextEntered", json!("a")).await.unwrap();
        sender.try_report("ui", "onTextEntered", json!("b")).unwrap();

        let drained = inbox.drain();
        let values: Vec<&Value> = drained.iter().map(|o| &o.value).collect();
        assert_eq!(values, vec![&json!("a"), &json!("b")]);
        assert!(inbox.drain().is_empty());
    }

    #[tokio::test]
    async fn test_try_report_when_full() {
        let (sender, _inbox) = UiInbox::channel(1);
        sender.try_report("ui", "p", json!(1)).unwrap();
        let err = sender.try_report("ui", "p", json!(2)).unwrap_err();
        assert_eq!(err.to_string(), "UI inbox full");
    }

    #[tokio::test]
    async fn test_recv_timeout_expires() {
        let (_sender, mut inbox) = UiInbox::channel(1);
        let got = inbox.recv_timeout(Duration::from_millis(20)).await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_report_after_inbox_dropped() {
        let (sender, inbox) = UiInbox::channel(1);
        drop(inbox);
        assert!(sender.report("ui", "p", json!(1)).await.is_err());
    }
}
