use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use super::domain::{
    preview, Conversation, ConversationType, Message, MessageQuery, MessageRead, MessageStatus,
    NewMessage,
};
use crate::error::{require_text, ServiceError};
use crate::members::{display_name, Member};
use crate::notifications::{
    publish, EventPublisher, NotificationCenter, NotificationDraft, NotificationSource,
    RealtimeEvent,
};
use crate::store::{require, Database, Repository, RepositoryError};
use crate::tenancy::{Actor, SchemaName};

pub fn conversation_channel(conversation_id: u64) -> String {
    format!("conversation-{conversation_id}")
}

pub struct MessagingService {
    conversations: Arc<dyn Repository<Conversation>>,
    messages: Arc<dyn Repository<Message>>,
    reads: Arc<dyn Repository<MessageRead>>,
    members: Arc<dyn Repository<Member>>,
    publisher: Arc<dyn EventPublisher>,
    notifications: Arc<NotificationCenter>,
}

impl MessagingService {
    pub fn new(
        database: &Database,
        publisher: Arc<dyn EventPublisher>,
        notifications: Arc<NotificationCenter>,
    ) -> Self {
        Self {
            conversations: database.conversations.clone(),
            messages: database.messages.clone(),
            reads: database.message_reads.clone(),
            members: database.members.clone(),
            publisher,
            notifications,
        }
    }

    fn joined(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        conversation_id: u64,
    ) -> Result<Conversation, ServiceError> {
        let conversation = require(self.conversations.as_ref(), schema, conversation_id)?;
        if !conversation.includes(actor.user_id) {
            return Err(ServiceError::forbidden(
                "you are not a participant of this conversation",
            ));
        }
        Ok(conversation)
    }

    /// The direct conversation between the caller and `other`, created on first use.
    pub fn direct_conversation(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        other: u64,
    ) -> Result<Conversation, ServiceError> {
        if other == actor.user_id {
            return Err(ServiceError::validation(
                "user_id",
                "a conversation needs another participant",
            ));
        }
        let mut pair = vec![actor.user_id, other];
        pair.sort_unstable();
        let is_pair = |conversation: &Conversation| {
            conversation.conversation_type == ConversationType::Direct
                && conversation.participants == pair
        };

        let now = Utc::now();
        let candidate = Conversation {
            id: 0,
            conversation_type: ConversationType::Direct,
            participants: pair.clone(),
            created_at: now,
            updated_at: now,
        };
        match self.conversations.insert_unique(schema, candidate, &is_pair) {
            Ok(created) => {
                tracing::info!(%schema, conversation_id = created.id, "direct conversation opened");
                Ok(created)
            }
            Err(RepositoryError::Conflict) => self
                .conversations
                .find(schema, &is_pair)?
                .into_iter()
                .next()
                .ok_or_else(|| ServiceError::invalid_state("direct conversation vanished")),
            Err(err) => Err(err.into()),
        }
    }

    /// Conversations of the caller, most recently active first.
    pub fn conversations_for(
        &self,
        schema: &SchemaName,
        actor: &Actor,
    ) -> Result<Vec<Conversation>, ServiceError> {
        let mut conversations = self
            .conversations
            .find(schema, &|conversation| conversation.includes(actor.user_id))?;
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(conversations)
    }

    pub fn send(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        conversation_id: u64,
        input: NewMessage,
    ) -> Result<Message, ServiceError> {
        let conversation = self.joined(schema, actor, conversation_id)?;
        let content = require_text("content", &input.content)?;
        for attachment in &input.attachments {
            require_text("attachments", &attachment.url)?;
        }

        let message = self.messages.insert(
            schema,
            Message {
                id: 0,
                conversation_id,
                sender_id: actor.user_id,
                content,
                status: MessageStatus::Sent,
                attachments: input.attachments,
                created_at: Utc::now(),
            },
        )?;
        self.conversations
            .modify(schema, conversation_id, &mut |conversation| {
                conversation.updated_at = message.created_at;
                Ok(())
            })?;

        let sender = display_name(self.members.as_ref(), schema, actor.user_id)?
            .unwrap_or_else(|| format!("Usuario {}", actor.user_id));
        let draft = NotificationDraft::new(
            NotificationSource::Message,
            "Nuevo mensaje",
            format!("{sender}: {}", preview(&message.content)),
        )
        .source_id(message.id)
        .link(format!("/messages/{conversation_id}"));
        for participant in conversation
            .participants
            .iter()
            .filter(|participant| **participant != actor.user_id)
        {
            self.notifications.deliver(schema, *participant, draft.clone());
        }
        publish(
            self.publisher.as_ref(),
            schema,
            RealtimeEvent::new(
                "NEW_MESSAGE",
                conversation_channel(conversation_id),
                json!(message),
            ),
        );
        tracing::debug!(%schema, conversation_id, message_id = message.id, "message sent");
        Ok(message)
    }

    /// Newest messages first. Messages from others still marked SENT become DELIVERED.
    pub fn messages(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        conversation_id: u64,
        query: &MessageQuery,
    ) -> Result<Vec<Message>, ServiceError> {
        self.joined(schema, actor, conversation_id)?;
        let mut messages = self.messages.find(schema, &|message| {
            message.conversation_id == conversation_id
                && query.before.map_or(true, |before| message.created_at < before)
        })?;
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        messages.truncate(query.limit());

        for message in messages
            .iter_mut()
            .filter(|message| message.sender_id != actor.user_id)
            .filter(|message| message.status == MessageStatus::Sent)
        {
            *message = self.messages.modify(schema, message.id, &mut |stored| {
                if stored.status == MessageStatus::Sent {
                    stored.status = MessageStatus::Delivered;
                }
                Ok(())
            })?;
        }
        Ok(messages)
    }

    /// Record a read receipt. The message turns READ once every other participant has read it.
    pub fn mark_read(
        &self,
        schema: &SchemaName,
        actor: &Actor,
        message_id: u64,
    ) -> Result<MessageRead, ServiceError> {
        let message = require(self.messages.as_ref(), schema, message_id)?;
        let conversation = self.joined(schema, actor, message.conversation_id)?;

        let same_reader =
            |read: &MessageRead| read.message_id == message_id && read.user_id == actor.user_id;
        let receipt = MessageRead {
            id: 0,
            message_id,
            user_id: actor.user_id,
            read_at: Utc::now(),
        };
        let read = match self.reads.insert_unique(schema, receipt, &same_reader) {
            Ok(stored) => stored,
            Err(RepositoryError::Conflict) => {
                return self
                    .reads
                    .find(schema, &same_reader)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| ServiceError::not_found("message read", message_id));
            }
            Err(err) => return Err(err.into()),
        };

        let recipients: Vec<u64> = conversation
            .participants
            .iter()
            .copied()
            .filter(|participant| *participant != message.sender_id)
            .collect();
        let reads = self.reads.as_ref();
        self.messages.modify(schema, message_id, &mut |stored| {
            let readers = reads
                .find(schema, &|read| {
                    read.message_id == message_id && recipients.contains(&read.user_id)
                })?
                .len();
            if readers >= recipients.len() {
                stored.status = MessageStatus::Read;
            }
            Ok(())
        })?;
        Ok(read)
    }
}
