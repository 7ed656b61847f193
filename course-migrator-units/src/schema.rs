use sea_query::Iden;

#[derive(Iden)]
pub enum Users {
    Table,
    UserId,
}

#[derive(Iden)]
pub enum Chatrooms {
    Table,
    Id,
    HostId,
    HostName,
    Title,
    Description,
    IsActive,
    AllowAnon,
}

#[derive(Iden)]
pub enum ChatroomMessages {
    Table,
    Id,
    ChatroomId,
    UserId,
    DisplayName,
    Role,
    Content,
    Timestamp,
}
