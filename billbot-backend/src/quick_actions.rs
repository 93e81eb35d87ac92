//! Quick actions: fixed prompts reachable through slash commands or plain phrases.
//!
//! Resolution is exact (after trimming), case-sensitive and side-effect free so it
//! can run on every inbound message.

use once_cell::sync::Lazy;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum QuickActionKey {
    Report,
    Compare,
    Timeline,
    Categories,
}

#[derive(Debug, Clone)]
pub struct QuickAction {
    pub key: QuickActionKey,
    pub title: &'static str,
    pub prompt: &'static str,
    pub aliases: &'static [&'static str],
}

impl QuickAction {
    /// Slash command form, e.g. `/report`
    pub fn command(&self) -> String {
        format!("/{}", self.key)
    }
}

static REGISTRY: Lazy<QuickActionRegistry> = Lazy::new(QuickActionRegistry::builtin);

pub struct QuickActionRegistry {
    actions: Vec<QuickAction>,
}

impl QuickActionRegistry {
    /// Process-wide registry with the built-in actions.
    pub fn global() -> &'static QuickActionRegistry {
        &REGISTRY
    }

    fn builtin() -> Self {
        let actions = QuickActionKey::iter()
            .map(|key| match key {
                QuickActionKey::Report => QuickAction {
                    key,
                    title: "生成最近开销报表",
                    prompt: "请调用 get_expense_summary 统计本月（按月）的支出情况，\
                             给出总支出和各分类的金额与占比，并附上图表。",
                    aliases: &["/report", "生成报表", "开销报表", "最近开销"],
                },
                QuickActionKey::Compare => QuickAction {
                    key,
                    title: "对比本月和上月开销",
                    prompt: "请对比本月与上月的支出情况（按月），列出两期总支出、\
                             各分类的变化金额，并指出变化最大的分类。",
                    aliases: &["/compare", "开销对比", "对比开销"],
                },
                QuickActionKey::Timeline => QuickAction {
                    key,
                    title: "查看最近开销趋势",
                    prompt: "请按周统计最近两个月的支出趋势，说明支出最高和最低的时间段。",
                    aliases: &["/timeline", "开销趋势", "支出趋势"],
                },
                QuickActionKey::Categories => QuickAction {
                    key,
                    title: "查看所有分类",
                    prompt: "请列出当前所有可用的收支分类及其描述。",
                    aliases: &["/categories", "查看分类", "分类列表"],
                },
            })
            .collect();

        Self { actions }
    }

    pub fn actions(&self) -> &[QuickAction] {
        &self.actions
    }

    pub fn get(&self, key: QuickActionKey) -> Option<&QuickAction> {
        self.actions.iter().find(|a| a.key == key)
    }

    /// Resolve free text to a quick action.
    ///
    /// Checks the registry key first (leading slash and any `@botname` suffix
    /// stripped), then the aliases and the title.
    pub fn resolve(&self, text: &str) -> Option<&QuickAction> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        let command = trimmed.strip_prefix('/').unwrap_or(trimmed);
        let command = command.split_once('@').map_or(command, |(name, _)| name);
        if let Ok(key) = QuickActionKey::from_str(command) {
            return self.get(key);
        }

        self.actions
            .iter()
            .find(|a| a.title == trimmed || a.aliases.contains(&trimmed))
    }

    /// Menu text listing every quick action, sent in reply to `/start`.
    pub fn menu_text(&self) -> String {
        let mut text = String::from(
            "你好！我是记账助手。直接发送文字（如“午餐100元”）或账单照片即可记账。\n\
             也可以使用以下快捷操作：\n",
        );
        for action in &self.actions {
            text.push_str(&format!("{} {}\n", action.command(), action.title));
        }
        text.push_str("/cancel 清空待处理的图片");
        text
    }
}
