//! Transaction type classification. Closed two-way classifier: a handful of labels
//! mean income, everything else (including a missing label) is an expense.

use pocketlens_core::TxnKind;

const INCOME_LABELS: [&str; 4] = ["income", "credit", "cr", "in"];

pub fn classify_kind(label: Option<&str>) -> TxnKind {
    let Some(label) = label else {
        return TxnKind::Expense;
    };
    let label = label.trim();
    if INCOME_LABELS.iter().any(|l| l.eq_ignore_ascii_case(label)) {
        TxnKind::Income
    } else {
        TxnKind::Expense
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_income_labels_any_case() {
        for label in ["income", "INCOME", "Credit", "CR", "cr", "In", " in "] {
            assert_eq!(classify_kind(Some(label)), TxnKind::Income, "label {label:?}");
        }
    }

    #[test]
    fn test_everything_else_is_expense() {
        for label in ["debit", "dr", "expense", "", "incoming", "refund", "out", "crédit"] {
            assert_eq!(classify_kind(Some(label)), TxnKind::Expense, "label {label:?}");
        }
        assert_eq!(classify_kind(None), TxnKind::Expense);
    }
}
