//! Read-side queries: the dashboard summary and the data context handed to the
//! language model for a question.

use chrono::{Duration, NaiveDate};
use pocketlens_core::TxnKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::backend::TableStore;
use crate::error::StoreError;
use crate::import::{BUDGETS_TABLE, TRANSACTIONS_TABLE};
use crate::query::Select;
use crate::session::Authenticated;

const DASHBOARD_LIMIT: usize = 20;
const CHAT_TRANSACTION_LIMIT: usize = 500;
const CHAT_BUDGET_LIMIT: usize = 100;

/// Numeric columns may come back as JSON numbers or strings depending on column type
fn amount_from_json<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
    }
    match Raw::deserialize(d)? {
        Raw::Num(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Embedded one-hop category (`categories(name)`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionView {
    pub date: NaiveDate,
    #[serde(deserialize_with = "amount_from_json")]
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: TxnKind,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub categories: Option<CategoryRef>,
}

impl TransactionView {
    pub fn category_name(&self) -> Option<&str> {
        self.categories.as_ref().map(|c| c.name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetView {
    pub month: NaiveDate,
    #[serde(deserialize_with = "amount_from_json")]
    pub amount: f64,
    #[serde(default)]
    pub categories: Option<CategoryRef>,
}

impl BudgetView {
    pub fn category_name(&self) -> Option<&str> {
        self.categories.as_ref().map(|c| c.name.as_str())
    }
}

fn decode<T: DeserializeOwned>(rows: Vec<Value>, table: &str) -> Result<Vec<T>, StoreError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(|e| StoreError::Decode(format!("{table} row: {e}"))))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub recent: Vec<TransactionView>,
    pub budgets: Vec<BudgetView>,
    /// Totals over `recent` only
    pub income: f64,
    pub expense: f64,
}

pub async fn load_dashboard<S: TableStore>(client: &Authenticated<S>) -> Result<Dashboard, StoreError> {
    let tx = client
        .select(
            &Select::from(TRANSACTIONS_TABLE)
                .columns("id,date,amount,type,description,categories(name)")
                .order("date", false)
                .limit(DASHBOARD_LIMIT),
        )
        .await?;
    let recent: Vec<TransactionView> = decode(tx.data, TRANSACTIONS_TABLE)?;

    let income = recent.iter().filter(|t| t.kind == TxnKind::Income).map(|t| t.amount).sum();
    let expense = recent.iter().filter(|t| t.kind == TxnKind::Expense).map(|t| t.amount).sum();

    let bj = client
        .select(
            &Select::from(BUDGETS_TABLE)
                .columns("id,month,amount,categories(name)")
                .order("categories(name)", true)
                .limit(DASHBOARD_LIMIT),
        )
        .await?;

    Ok(Dashboard {
        recent,
        budgets: decode(bj.data, BUDGETS_TABLE)?,
        income,
        expense,
    })
}

/// Stored data backing one question to the language model
#[derive(Debug, Clone, PartialEq)]
pub struct ChatContext {
    pub days: u32,
    /// All transactions the user has, regardless of timeframe
    pub total_transactions: u64,
    pub transactions: Vec<TransactionView>,
    pub budgets: Vec<BudgetView>,
}

pub async fn load_chat_context<S: TableStore>(
    client: &Authenticated<S>,
    days: u32,
    today: NaiveDate,
) -> Result<ChatContext, StoreError> {
    let counted = client
        .select(&Select::from(TRANSACTIONS_TABLE).columns("id").limit(1).count_exact())
        .await?;

    let mut window = Select::from(TRANSACTIONS_TABLE).columns("date,amount,type,description,categories(name)");
    // a window reaching past the earliest representable date covers every row
    if let Some(since) = today.checked_sub_signed(Duration::days(i64::from(days))) {
        window = window.gte("date", since);
    }
    let tx = client
        .select(&window.order("date", false).limit(CHAT_TRANSACTION_LIMIT))
        .await?;

    let budgets = client
        .select(
            &Select::from(BUDGETS_TABLE)
                .columns("month,amount,category_id,categories(name)")
                .order("month", false)
                .limit(CHAT_BUDGET_LIMIT),
        )
        .await?;

    Ok(ChatContext {
        days,
        total_transactions: counted.count.unwrap_or(0),
        transactions: decode(tx.data, TRANSACTIONS_TABLE)?,
        budgets: decode(budgets.data, BUDGETS_TABLE)?,
    })
}

impl ChatContext {
    pub fn timeframe_text(&self) -> String {
        if self.days <= 90 {
            format!("the last {} days", self.days)
        } else {
            format!("the last {} months", self.days / 30)
        }
    }

    pub fn has_transactions(&self) -> bool {
        self.total_transactions > 0
    }

    pub fn has_data_in_timeframe(&self) -> bool {
        !self.transactions.is_empty()
    }

    /// User prompt grounding the question in the stored rows
    pub fn prompt(&self, question: &str) -> String {
        let transactions = serde_json::to_string(&self.transactions).unwrap_or_else(|_| "[]".to_string());
        let budgets = serde_json::to_string(&self.budgets).unwrap_or_else(|_| "[]".to_string());

        format!(
            "You are a strict but helpful personal finance coach. Answer the user's question from the JSON data below and give practical advice.\n\
Keep the response clear and concise. Use Indian Rupee (INR) as the default currency.\n\
\n\
CONTEXT:\n\
- The user is asking about {timeframe}\n\
- Total transactions on record: {total}\n\
- Transactions in the selected timeframe: {in_frame}\n\
- Budgets available: {budget_count}\n\
\n\
USER QUESTION:\n\
{question}\n\
\n\
TRANSACTIONS DATA:\n\
{transactions}\n\
\n\
BUDGETS DATA:\n\
{budgets}\n\
\n\
RESPONSE GUIDELINES:\n\
1. If there are no transactions at all, tell the user to upload transaction data from the dashboard first.\n\
2. If there are transactions on record but none in the timeframe, suggest a longer timeframe.\n\
3. Otherwise give specific insights from the real data, quoting numbers and dates.\n\
4. Stay professional and straightforward.\n",
            timeframe = self.timeframe_text(),
            total = self.total_transactions,
            in_frame = self.transactions.len(),
            budget_count = self.budgets.len(),
            question = question.trim(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context(days: u32) -> ChatContext {
        ChatContext {
            days,
            total_transactions: 0,
            transactions: Vec::new(),
            budgets: Vec::new(),
        }
    }

    #[test]
    fn test_timeframe_text() {
        assert_eq!(context(30).timeframe_text(), "the last 30 days");
        assert_eq!(context(90).timeframe_text(), "the last 90 days");
        assert_eq!(context(180).timeframe_text(), "the last 6 months");
        assert_eq!(context(365).timeframe_text(), "the last 12 months");
    }

    #[test]
    fn test_view_accepts_numeric_strings_and_missing_embed() {
        let t: TransactionView = serde_json::from_value(json!({
            "id": 7, "date": "2024-01-05", "amount": "1200.50", "type": "expense",
            "description": null, "categories": null
        }))
        .unwrap();
        assert_eq!(t.amount, 1200.5);
        assert_eq!(t.category_name(), None);

        let b: BudgetView = serde_json::from_value(json!({
            "month": "2025-11-01", "amount": 5000, "categories": {"name": "Groceries"}
        }))
        .unwrap();
        assert_eq!(b.amount, 5000.0);
        assert_eq!(b.category_name(), Some("Groceries"));
    }

    #[test]
    fn test_prompt_carries_question_and_counts() {
        let mut ctx = context(30);
        ctx.total_transactions = 12;
        let prompt = ctx.prompt("  Can I afford a new phone?  ");
        assert!(prompt.contains("Can I afford a new phone?"));
        assert!(prompt.contains("Total transactions on record: 12"));
        assert!(prompt.contains("Transactions in the selected timeframe: 0"));
        assert!(prompt.contains("the last 30 days"));
        assert!(ctx.has_transactions());
        assert!(!ctx.has_data_in_timeframe());
    }
}
