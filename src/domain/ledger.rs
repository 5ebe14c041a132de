use std::collections::{HashMap, HashSet};

use super::{AccountBalance, AccountId, Kobo, TransactionRecord, TransactionStatus};

/// Replay balances for every account that appears in the log.
/// Balance = sum of completed credits - sum of completed debits
pub fn compute_all_balances(records: &[TransactionRecord]) -> HashMap<AccountId, Kobo> {
    let mut balances: HashMap<AccountId, Kobo> = HashMap::new();

    for record in records {
        *balances.entry(record.account_id).or_insert(0) += record.balance_effect();
    }

    balances
}

/// Result of comparing stored balances against the transaction log.
#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub account_count: usize,
    pub transaction_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub pending_count: usize,
    pub total_balance: Kobo,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    NegativeBalance {
        account_id: AccountId,
        balance: Kobo,
    },
    BalanceMismatch {
        account_id: AccountId,
        stored: Kobo,
        replayed: Kobo,
    },
    VersionBehindLog {
        account_id: AccountId,
        version: i64,
        completed: usize,
    },
    StalePending {
        transaction_id: String,
    },
    OrphanTransaction {
        transaction_id: String,
        account_id: AccountId,
    },
}

impl std::fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityIssue::NegativeBalance {
                account_id,
                balance,
            } => write!(f, "account {} has negative balance {}", account_id, balance),
            IntegrityIssue::BalanceMismatch {
                account_id,
                stored,
                replayed,
            } => write!(
                f,
                "account {} stores {} kobo but its log replays to {} kobo",
                account_id, stored, replayed
            ),
            IntegrityIssue::VersionBehindLog {
                account_id,
                version,
                completed,
            } => write!(
                f,
                "account {} is at version {} but has {} completed transactions",
                account_id, version, completed
            ),
            IntegrityIssue::StalePending { transaction_id } => {
                write!(f, "transaction {} is still pending", transaction_id)
            }
            IntegrityIssue::OrphanTransaction {
                transaction_id,
                account_id,
            } => write!(
                f,
                "transaction {} references unknown account {}",
                transaction_id, account_id
            ),
        }
    }
}

/// Build an integrity report from every account and every transaction record.
pub fn build_integrity_report(
    accounts: &[AccountBalance],
    records: &[TransactionRecord],
) -> IntegrityReport {
    let replayed = compute_all_balances(records);
    let known: HashSet<AccountId> = accounts.iter().map(|a| a.account_id).collect();
    let mut completed_per_account: HashMap<AccountId, usize> = HashMap::new();
    let mut report = IntegrityReport {
        account_count: accounts.len(),
        transaction_count: records.len(),
        ..Default::default()
    };

    for record in records {
        match record.status {
            TransactionStatus::Completed => {
                report.completed_count += 1;
                *completed_per_account.entry(record.account_id).or_insert(0) += 1;
            }
            TransactionStatus::Failed => report.failed_count += 1,
            TransactionStatus::Pending => {
                report.pending_count += 1;
                report.issues.push(IntegrityIssue::StalePending {
                    transaction_id: record.transaction_id.clone(),
                });
            }
        }

        if !known.contains(&record.account_id) {
            report.issues.push(IntegrityIssue::OrphanTransaction {
                transaction_id: record.transaction_id.clone(),
                account_id: record.account_id,
            });
        }
    }

    for account in accounts {
        report.total_balance += account.balance;

        if account.balance < 0 {
            report.issues.push(IntegrityIssue::NegativeBalance {
                account_id: account.account_id,
                balance: account.balance,
            });
        }

        let log_balance = replayed.get(&account.account_id).copied().unwrap_or(0);
        if log_balance != account.balance {
            report.issues.push(IntegrityIssue::BalanceMismatch {
                account_id: account.account_id,
                stored: account.balance,
                replayed: log_balance,
            });
        }

        // Every commit bumps the version and writes exactly one completed record
        let completed = completed_per_account
            .get(&account.account_id)
            .copied()
            .unwrap_or(0);
        if (account.version as usize) < completed {
            report.issues.push(IntegrityIssue::VersionBehindLog {
                account_id: account.account_id,
                version: account.version,
                completed,
            });
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::domain::Direction;

    fn completed(account: AccountId, key: &str, direction: Direction, amount: Kobo) -> TransactionRecord {
        TransactionRecord::new(key, account, direction, amount, 0, "test").completed()
    }

    fn account_with(account_id: AccountId, balance: Kobo, version: i64) -> AccountBalance {
        AccountBalance {
            balance,
            version,
            ..AccountBalance::open(account_id)
        }
    }

    #[test]
    fn test_compute_all_balances_empty() {
        assert!(compute_all_balances(&[]).is_empty());
    }

    #[test]
    fn test_compute_all_balances_mixed() {
        let account = Uuid::new_v4();
        let other = Uuid::new_v4();
        let records = vec![
            completed(account, "a", Direction::Credit, 5000),
            completed(account, "b", Direction::Debit, 1500),
            TransactionRecord::new("c", account, Direction::Debit, 9000, 3500, "x").failed(),
            completed(other, "d", Direction::Credit, 700),
        ];

        let all = compute_all_balances(&records);
        assert_eq!(all.get(&account), Some(&3500));
        assert_eq!(all.get(&other), Some(&700));
    }

    #[test]
    fn test_report_healthy_ledger() {
        let id = Uuid::new_v4();
        let records = vec![
            completed(id, "a", Direction::Credit, 1000),
            completed(id, "b", Direction::Debit, 400),
        ];
        let report = build_integrity_report(&[account_with(id, 600, 2)], &records);

        assert!(report.is_healthy(), "issues: {:?}", report.issues);
        assert_eq!(report.completed_count, 2);
        assert_eq!(report.total_balance, 600);
    }

    #[test]
    fn test_report_flags_mismatch_and_pending() {
        let id = Uuid::new_v4();
        let records = vec![
            completed(id, "a", Direction::Credit, 1000),
            TransactionRecord::new("p", id, Direction::Debit, 100, 900, "x"),
        ];
        let report = build_integrity_report(&[account_with(id, 900, 1)], &records);

        assert!(!report.is_healthy());
        assert!(report.issues.contains(&IntegrityIssue::BalanceMismatch {
            account_id: id,
            stored: 900,
            replayed: 1000,
        }));
        assert!(report.issues.contains(&IntegrityIssue::StalePending {
            transaction_id: "p".into(),
        }));
    }

    #[test]
    fn test_report_flags_orphans_and_stale_versions() {
        let id = Uuid::new_v4();
        let ghost = Uuid::new_v4();
        let records = vec![
            completed(id, "a", Direction::Credit, 1000),
            completed(ghost, "g", Direction::Credit, 50),
        ];
        let report = build_integrity_report(&[account_with(id, 1000, 0)], &records);

        assert!(report.issues.iter().any(|i| matches!(
            i,
            IntegrityIssue::OrphanTransaction { account_id, .. } if *account_id == ghost
        )));
        assert!(report.issues.iter().any(|i| matches!(
            i,
            IntegrityIssue::VersionBehindLog { version: 0, completed: 1, .. }
        )));
    }
}
