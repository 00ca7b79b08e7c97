const CREATE_USER_TABLE: &str = "CREATE TABLE IF NOT EXISTS app_user (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL UNIQUE,
  payment_account TEXT,
  created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

const CREATE_GROUP_TABLE: &str = "CREATE TABLE IF NOT EXISTS expense_group (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  name TEXT NOT NULL UNIQUE,
  creator_id INTEGER NOT NULL REFERENCES app_user(id),
  created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

const CREATE_GROUP_MEMBER_TABLE: &str = "CREATE TABLE IF NOT EXISTS group_member (
  group_id INTEGER NOT NULL REFERENCES expense_group(id),
  user_id INTEGER NOT NULL REFERENCES app_user(id),
  joined_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
  UNIQUE(group_id, user_id)
)";

const CREATE_BILL_TABLE: &str = "CREATE TABLE IF NOT EXISTS bill (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  creator_id INTEGER NOT NULL REFERENCES app_user(id),
  group_id INTEGER REFERENCES expense_group(id),
  total INTEGER NOT NULL,
  status TEXT NOT NULL DEFAULT 'pending',
  receipt_image TEXT,
  description TEXT,
  created_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
  updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

const CREATE_BILL_ITEM_TABLE: &str = "CREATE TABLE IF NOT EXISTS bill_item (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  bill_id INTEGER NOT NULL REFERENCES bill(id),
  name TEXT NOT NULL,
  price INTEGER NOT NULL,
  quantity INTEGER NOT NULL DEFAULT 1
)";

const CREATE_ITEM_ASSIGNMENT_TABLE: &str = "CREATE TABLE IF NOT EXISTS item_assignment (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  item_id INTEGER NOT NULL REFERENCES bill_item(id),
  user_id INTEGER NOT NULL REFERENCES app_user(id),
  share_percentage INTEGER NOT NULL
)";

const CREATE_LEDGER_ENTRY_TABLE: &str = "CREATE TABLE IF NOT EXISTS ledger_entry (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  group_id INTEGER NOT NULL REFERENCES expense_group(id),
  entry_type TEXT NOT NULL,
  payer_id INTEGER NOT NULL REFERENCES app_user(id),
  recipient_id INTEGER REFERENCES app_user(id),
  bill_id INTEGER REFERENCES bill(id),
  amount INTEGER NOT NULL,
  description TEXT NOT NULL,
  created_at DATETIME NOT NULL
)";

pub fn create_all_tables(connection: &rusqlite::Connection) -> anyhow::Result<()> {
    connection.execute(CREATE_USER_TABLE, ())?;
    connection.execute(CREATE_GROUP_TABLE, ())?;
    connection.execute(CREATE_GROUP_MEMBER_TABLE, ())?;
    connection.execute(CREATE_BILL_TABLE, ())?;
    connection.execute(CREATE_BILL_ITEM_TABLE, ())?;
    connection.execute(CREATE_ITEM_ASSIGNMENT_TABLE, ())?;
    connection.execute(CREATE_LEDGER_ENTRY_TABLE, ())?;
    Ok(())
}
