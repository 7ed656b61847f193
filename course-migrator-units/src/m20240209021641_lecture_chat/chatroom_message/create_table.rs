use sea_query::{Alias, ColumnDef, ForeignKey, ForeignKeyAction, PostgresQueryBuilder, Table};

use crate::schema::{ChatroomMessages, Chatrooms, Users};

pub fn up_statement() -> String {
    Table::create()
        .table(ChatroomMessages::Table)
        .if_not_exists()
        .col(
            ColumnDef::new(ChatroomMessages::Id)
                .integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(
            ColumnDef::new(ChatroomMessages::ChatroomId)
                .integer()
                .not_null(),
        )
        .col(ColumnDef::new(ChatroomMessages::UserId).string().not_null())
        .col(ColumnDef::new(ChatroomMessages::DisplayName).string())
        .col(ColumnDef::new(ChatroomMessages::Role).string())
        .col(ColumnDef::new(ChatroomMessages::Content).text().not_null())
        .col(
            ColumnDef::new(ChatroomMessages::Timestamp)
                .custom(Alias::new("timestamp(0) with time zone"))
                .not_null(),
        )
        .foreign_key(
            ForeignKey::create()
                .from(ChatroomMessages::Table, ChatroomMessages::ChatroomId)
                .to(Chatrooms::Table, Chatrooms::Id)
                .on_delete(ForeignKeyAction::Cascade),
        )
        .foreign_key(
            ForeignKey::create()
                .from(ChatroomMessages::Table, ChatroomMessages::UserId)
                .to(Users::Table, Users::UserId)
                .on_delete(ForeignKeyAction::Cascade),
        )
        .to_owned()
        .to_string(PostgresQueryBuilder)
}

pub fn down_statement() -> String {
    Table::drop()
        .table(ChatroomMessages::Table)
        .if_exists()
        .to_owned()
        .to_string(PostgresQueryBuilder)
}
