//! JavaScript evaluated inside the observed live page
//!
//! The observer pushes into `window.__ixenQueue`; the drain script empties
//! the queue and reports whether the "stream ended" markers have appeared.
//! Class-name fragments are matched with `[class*=...]` because the platform
//! hashes its CSS class suffixes.

/// Markers shown when a stream has ended or is unavailable
pub const ENDED_SELECTOR: &str = ".tiktok-1w1v2n1-DivLiveEnded, .tiktok-j62k2q-DivContainer";

/// Chat room container observed for new rows
pub const CHAT_CONTAINER_SELECTOR: &str = "[class*=\"DivChatRoom\"]";

/// Evaluates to `true` when no "ended" marker is present
pub fn live_probe() -> String {
    format!(
        "(() => !document.querySelector('{}'))()",
        ENDED_SELECTOR
    )
}

/// Installs the chat observer; evaluates to `false` when the chat container is missing
pub fn install_observer() -> String {
    OBSERVER_TEMPLATE.replace("__CHAT_CONTAINER__", CHAT_CONTAINER_SELECTOR)
}

/// Empties the queue; evaluates to a JSON string `{ended, comments, gifts}`
pub fn drain() -> String {
    DRAIN_TEMPLATE.replace("__ENDED__", ENDED_SELECTOR)
}

const OBSERVER_TEMPLATE: &str = r#"(() => {
  window.__ixenQueue = window.__ixenQueue || { comments: [], gifts: [] };
  const queue = window.__ixenQueue;
  const chat = document.querySelector('__CHAT_CONTAINER__');
  if (!chat) return false;
  if (window.__ixenObserver) return true;

  const text = (root, fragment) => {
    const el = root.querySelector('[class*="' + fragment + '"]');
    return el && el.textContent ? el.textContent.trim() : null;
  };

  const observer = new MutationObserver((mutations) => {
    for (const mutation of mutations) {
      for (const node of mutation.addedNodes) {
        if (node.nodeType !== Node.ELEMENT_NODE) continue;
        const img = node.querySelector('img');
        const avatar = img ? img.src : null;
        const user = text(node, 'NickName');
        const comment = text(node, 'CommentText');
        if (user && comment) {
          queue.comments.push({ uniqueId: user, comment: comment, profilePictureUrl: avatar });
          continue;
        }
        const giftName = text(node, 'GiftName');
        if (user && giftName) {
          const count = parseInt((text(node, 'GiftCount') || '1').replace(/[^0-9]/g, ''), 10);
          queue.gifts.push({
            uniqueId: user,
            giftName: giftName,
            repeatCount: Number.isFinite(count) ? count : 1,
            profilePictureUrl: avatar
          });
        }
      }
    }
  });

  observer.observe(chat, { childList: true, subtree: true });
  window.__ixenObserver = observer;
  return true;
})()"#;

const DRAIN_TEMPLATE: &str = r#"(() => {
  const queue = window.__ixenQueue || { comments: [], gifts: [] };
  return JSON.stringify({
    ended: !!document.querySelector('__ENDED__'),
    comments: queue.comments.splice(0),
    gifts: queue.gifts.splice(0)
  });
})()"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_replaced() {
        assert!(!install_observer().contains("__CHAT_CONTAINER__"));
        assert!(install_observer().contains("DivChatRoom"));
        assert!(!drain().contains("__ENDED__"));
        assert!(drain().contains("DivLiveEnded"));
    }

    #[test]
    fn test_probe_uses_ended_selector() {
        assert!(live_probe().contains(ENDED_SELECTOR));
    }
}
