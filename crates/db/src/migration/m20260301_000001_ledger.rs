//! Ledger schema migration.
//!
//! Creates the account and journal tables plus the triggers that enforce
//! double-entry balance and journal immutability at the database level.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;

        // ============================================================
        // PART 2: ACCOUNTS
        // ============================================================
        db.execute_unprepared(ACCOUNTS_SQL).await?;

        // ============================================================
        // PART 3: JOURNAL
        // ============================================================
        db.execute_unprepared(JOURNAL_ENTRIES_SQL).await?;
        db.execute_unprepared(POSTINGS_SQL).await?;

        // ============================================================
        // PART 4: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE account_type AS ENUM ('checking', 'savings', 'cash', 'investment');

CREATE TYPE entry_status AS ENUM ('posted');
";

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL,
    name VARCHAR(255) NOT NULL,
    account_type account_type NOT NULL,
    currency VARCHAR(3) NOT NULL CHECK (currency ~ '^[A-Z]{3}$'),
    balance NUMERIC NOT NULL DEFAULT 0,
    balance_version BIGINT NOT NULL DEFAULT 0 CHECK (balance_version >= 0),
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX idx_accounts_user ON accounts(user_id, created_at);
";

const JOURNAL_ENTRIES_SQL: &str = r"
CREATE TABLE journal_entries (
    id UUID PRIMARY KEY,
    description TEXT NOT NULL,
    status entry_status NOT NULL DEFAULT 'posted',
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
";

const POSTINGS_SQL: &str = r"
CREATE TABLE postings (
    id UUID PRIMARY KEY,
    journal_entry_id UUID NOT NULL REFERENCES journal_entries(id),
    account_id UUID NOT NULL REFERENCES accounts(id),
    position INTEGER NOT NULL CHECK (position >= 0),
    amount NUMERIC NOT NULL CHECK (amount >= 0),
    direction SMALLINT NOT NULL CHECK (direction IN (-1, 1)),
    UNIQUE (journal_entry_id, position)
);

CREATE INDEX idx_postings_account ON postings(account_id);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: check_entry_balance
-- Signed postings of an entry must sum to zero, checked at commit
-- ============================================================
CREATE OR REPLACE FUNCTION check_entry_balance()
RETURNS TRIGGER AS $$
DECLARE
    net NUMERIC;
    posting_count INTEGER;
BEGIN
    SELECT COALESCE(SUM(amount * direction), 0), COUNT(*)
    INTO net, posting_count
    FROM postings
    WHERE journal_entry_id = NEW.journal_entry_id;

    IF posting_count < 2 THEN
        RAISE EXCEPTION 'Journal entry % has % postings, at least 2 required',
            NEW.journal_entry_id, posting_count;
    END IF;

    IF net <> 0 THEN
        RAISE EXCEPTION 'Journal entry % is not balanced: postings net to %',
            NEW.journal_entry_id, net;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE CONSTRAINT TRIGGER trg_check_entry_balance
AFTER INSERT ON postings
DEFERRABLE INITIALLY DEFERRED
FOR EACH ROW
EXECUTE FUNCTION check_entry_balance();

-- ============================================================
-- FUNCTION: prevent_journal_modification
-- Journal entries and postings are write-once
-- ============================================================
CREATE OR REPLACE FUNCTION prevent_journal_modification()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION 'Cannot % rows of %: journal is immutable', TG_OP, TG_TABLE_NAME;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_journal_entries_immutable
BEFORE UPDATE OR DELETE ON journal_entries
FOR EACH ROW
EXECUTE FUNCTION prevent_journal_modification();

CREATE TRIGGER trg_postings_immutable
BEFORE UPDATE OR DELETE ON postings
FOR EACH ROW
EXECUTE FUNCTION prevent_journal_modification();
";

const DROP_ALL_SQL: &str = r"
-- Drop triggers
DROP TRIGGER IF EXISTS trg_postings_immutable ON postings;
DROP TRIGGER IF EXISTS trg_journal_entries_immutable ON journal_entries;
DROP TRIGGER IF EXISTS trg_check_entry_balance ON postings;

-- Drop functions
DROP FUNCTION IF EXISTS prevent_journal_modification();
DROP FUNCTION IF EXISTS check_entry_balance();

-- Drop tables (reverse order of creation)
DROP TABLE IF EXISTS postings CASCADE;
DROP TABLE IF EXISTS journal_entries CASCADE;
DROP TABLE IF EXISTS accounts CASCADE;

-- Drop enums
DROP TYPE IF EXISTS entry_status CASCADE;
DROP TYPE IF EXISTS account_type CASCADE;
";
