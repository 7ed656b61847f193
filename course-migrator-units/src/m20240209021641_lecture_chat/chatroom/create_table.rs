use sea_query::{ColumnDef, ForeignKey, ForeignKeyAction, PostgresQueryBuilder, Table};

use crate::schema::{Chatrooms, Users};

pub fn up_statement() -> String {
    Table::create()
        .table(Chatrooms::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(Chatrooms::Id)
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(ColumnDef::new(Chatrooms::HostId).string().not_null())
        .col(ColumnDef::new(Chatrooms::HostName).string())
        .col(ColumnDef::new(Chatrooms::Title).text().not_null())
        .col(ColumnDef::new(Chatrooms::Description).text())
        .col(
            ColumnDef::new(Chatrooms::IsActive)
                .boolean()
                .default(false)
                .not_null(),
        )
        .col(
            ColumnDef::new(Chatrooms::AllowAnon)
                .boolean()
                .default(true)
                .not_null(),
        )
        .foreign_key(
            ForeignKey::create()
                .from(Chatrooms::Table, Chatrooms::HostId)
                .to(Users::Table, Users::UserId)
                .on_delete(ForeignKeyAction::Cascade),
        )
        .to_owned()
        .to_string(PostgresQueryBuilder)
}

/// Messages reference chatrooms, so this cascades to them.
pub fn down_statement() -> String {
    Table::drop()
        .table(Chatrooms::Table)
        .if_exists()
        .cascade()
        .to_owned()
        .to_string(PostgresQueryBuilder)
}
