mod chatroom;
mod chatroom_message;

use async_trait::async_trait;
use course_migrator::{Context, DatabaseError, Migration, Scope};

/// Live lecture chat: chatrooms hosted by an instructor and their messages.
pub struct LectureChat;

#[async_trait]
impl Migration for LectureChat {
    fn name(&self) -> &str {
        "20240209021641_lecture_chat"
    }

    fn scope(&self) -> Scope {
        Scope::Course
    }

    async fn up(&self, ctx: &mut Context<'_>) -> Result<(), DatabaseError> {
        ctx.execute(&chatroom::create_table::up_statement()).await?;
        ctx.execute(&chatroom_message::create_table::up_statement())
            .await?;

        Ok(())
    }

    async fn down(&self, ctx: &mut Context<'_>) -> Result<(), DatabaseError> {
        ctx.execute(&chatroom::create_table::down_statement())
            .await?;
        ctx.execute(&chatroom_message::create_table::down_statement())
            .await?;

        Ok(())
    }
}
