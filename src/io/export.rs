use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::WalletService;
use crate::domain::{AccountBalance, AccountId, TransactionRecord};
use crate::storage::LedgerStore;

/// Full ledger snapshot for JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub accounts: Vec<AccountBalance>,
    pub transactions: Vec<TransactionRecord>,
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a, S> {
    service: &'a WalletService<S>,
}

impl<'a, S: LedgerStore> Exporter<'a, S> {
    pub fn new(service: &'a WalletService<S>) -> Self {
        Self { service }
    }

    async fn transactions(
        &self,
        account_id: Option<AccountId>,
        limit: Option<usize>,
    ) -> Result<Vec<TransactionRecord>> {
        Ok(match account_id {
            Some(id) => self.service.history(id, limit).await?,
            None => self.service.list_transactions(limit).await?,
        })
    }

    /// Export transactions to CSV, newest first
    pub async fn export_transactions_csv<W: Write>(
        &self,
        account_id: Option<AccountId>,
        limit: Option<usize>,
        writer: W,
    ) -> Result<usize> {
        let records = self.transactions(account_id, limit).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "sequence",
            "transaction_id",
            "account_id",
            "direction",
            "amount_kobo",
            "balance_after_kobo",
            "status",
            "reason",
            "created_at",
        ])?;

        for record in &records {
            csv_writer.write_record([
                record.sequence.to_string(),
                record.transaction_id.clone(),
                record.account_id.to_string(),
                record.direction.as_str().to_string(),
                record.amount.to_string(),
                record.balance_after.to_string(),
                record.status.as_str().to_string(),
                record.reason.clone(),
                record.created_at.to_rfc3339(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(records.len())
    }

    /// Export transactions as a JSON array, newest first
    pub async fn export_transactions_json<W: Write>(
        &self,
        account_id: Option<AccountId>,
        limit: Option<usize>,
        mut writer: W,
    ) -> Result<usize> {
        let records = self.transactions(account_id, limit).await?;
        serde_json::to_writer_pretty(&mut writer, &records)?;
        writer.flush()?;
        Ok(records.len())
    }

    /// Export account balances to CSV
    pub async fn export_accounts_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let accounts = self.service.list_accounts().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["account_id", "balance_kobo", "version", "updated_at"])?;

        for account in &accounts {
            csv_writer.write_record([
                account.account_id.to_string(),
                account.balance.to_string(),
                account.version.to_string(),
                account.updated_at.to_rfc3339(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(accounts.len())
    }

    /// Export every account and transaction as a JSON snapshot
    pub async fn export_snapshot_json<W: Write>(&self, mut writer: W) -> Result<LedgerSnapshot> {
        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            accounts: self.service.list_accounts().await?,
            transactions: self.service.list_transactions(None).await?,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::storage::MemoryLedgerStore;

    #[tokio::test]
    async fn test_export_transactions_csv() {
        let service = WalletService::new(MemoryLedgerStore::new());
        let id = Uuid::new_v4();
        service.open_account(id).await.unwrap();
        service.credit(id, 5000, "topup", "c1").await.unwrap();
        service
            .debit(id, 1000, "airtime:mtn:08031234567", "d1")
            .await
            .unwrap();

        let mut out = Vec::new();
        let count = Exporter::new(&service)
            .export_transactions_csv(Some(id), None, &mut out)
            .await
            .unwrap();
        assert_eq!(count, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("sequence,transaction_id"));
        assert!(lines[1].contains(",d1,"));
        assert!(lines[1].contains("airtime:mtn:08031234567"));
        assert!(lines[2].contains(",c1,"));
    }

    #[tokio::test]
    async fn test_export_snapshot_json() {
        let service = WalletService::new(MemoryLedgerStore::new());
        let id = Uuid::new_v4();
        service.open_account(id).await.unwrap();
        service.credit(id, 700, "topup", "c1").await.unwrap();

        let mut out = Vec::new();
        let snapshot = Exporter::new(&service)
            .export_snapshot_json(&mut out)
            .await
            .unwrap();
        assert_eq!(snapshot.accounts.len(), 1);
        assert_eq!(snapshot.transactions.len(), 1);

        let parsed: LedgerSnapshot = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed.accounts[0].balance, 700);
        assert_eq!(parsed.transactions[0].transaction_id, "c1");
    }
}
