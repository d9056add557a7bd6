//! Initial schema: workspaces, requests and their child collections, run history

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Key/value child tables and the column linking a delta row to its base row
const KEY_VALUE_TABLES: [(&str, &str); 4] = [
    ("http_header", "parent_http_header_id"),
    ("http_search_param", "parent_http_search_param_id"),
    ("http_body_form", "parent_http_body_form_id"),
    ("http_body_urlencoded", "parent_http_body_urlencoded_id"),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ============================================================
        // 1. Users, workspaces, membership
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(uuid(Users::Id).primary_key())
                    .col(string(Users::Email).unique_key())
                    .col(string(Users::Name))
                    .col(big_integer(Users::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Workspaces::Table)
                    .if_not_exists()
                    .col(uuid(Workspaces::Id).primary_key())
                    .col(string(Workspaces::Name))
                    .col(uuid_null(Workspaces::GlobalEnvId))
                    .col(big_integer(Workspaces::CreatedAt))
                    .col(big_integer(Workspaces::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WorkspaceUsers::Table)
                    .if_not_exists()
                    .col(uuid(WorkspaceUsers::Id).primary_key())
                    .col(uuid(WorkspaceUsers::WorkspaceId))
                    .col(uuid(WorkspaceUsers::UserId))
                    .col(string_len(WorkspaceUsers::Role, 16))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_workspace_users_workspace_id")
                            .from(WorkspaceUsers::Table, WorkspaceUsers::WorkspaceId)
                            .to(Workspaces::Table, Workspaces::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_workspace_users_user_id")
                            .from(WorkspaceUsers::Table, WorkspaceUsers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_workspace_users_membership")
                    .table(WorkspaceUsers::Table)
                    .col(WorkspaceUsers::WorkspaceId)
                    .col(WorkspaceUsers::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_workspace_users_user_id")
                    .table(WorkspaceUsers::Table)
                    .col(WorkspaceUsers::UserId)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 2. Environments and variables
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Environments::Table)
                    .if_not_exists()
                    .col(uuid(Environments::Id).primary_key())
                    .col(uuid(Environments::WorkspaceId))
                    .col(string(Environments::Name))
                    .col(string(Environments::Description))
                    .col(big_integer(Environments::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_environments_workspace_id")
                            .from(Environments::Table, Environments::WorkspaceId)
                            .to(Workspaces::Table, Workspaces::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Variables::Table)
                    .if_not_exists()
                    .col(uuid(Variables::Id).primary_key())
                    .col(uuid(Variables::EnvId))
                    .col(string(Variables::Key))
                    .col(text(Variables::Value))
                    .col(boolean(Variables::Enabled))
                    .col(string(Variables::Description))
                    .col(double(Variables::DisplayOrder))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_variables_env_id")
                            .from(Variables::Table, Variables::EnvId)
                            .to(Environments::Table, Environments::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_variables_env_id")
                    .table(Variables::Table)
                    .col(Variables::EnvId)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 3. Requests
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Http::Table)
                    .if_not_exists()
                    .col(uuid(Http::Id).primary_key())
                    .col(uuid(Http::WorkspaceId))
                    .col(string(Http::Name))
                    .col(text(Http::Url))
                    .col(string_len(Http::Method, 16))
                    .col(text(Http::Description))
                    .col(string_len(Http::BodyKind, 16))
                    .col(double(Http::DisplayOrder))
                    .col(big_integer_null(Http::LastRunAt))
                    .col(uuid_null(Http::ParentHttpId))
                    .col(boolean(Http::IsDelta))
                    .col(string_null(Http::DeltaName))
                    .col(text_null(Http::DeltaUrl))
                    .col(string_len_null(Http::DeltaMethod, 16))
                    .col(text_null(Http::DeltaDescription))
                    .col(string_len_null(Http::DeltaBodyKind, 16))
                    .col(boolean(Http::IsSnapshot))
                    .col(big_integer(Http::CreatedAt))
                    .col(big_integer(Http::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_http_workspace_id")
                            .from(Http::Table, Http::WorkspaceId)
                            .to(Workspaces::Table, Workspaces::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_http_parent_http_id")
                            .from(Http::Table, Http::ParentHttpId)
                            .to(Http::Table, Http::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_http_workspace_id")
                    .table(Http::Table)
                    .col(Http::WorkspaceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_http_parent_http_id")
                    .table(Http::Table)
                    .col(Http::ParentHttpId)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 4. Request children
        // ============================================================
        for (table, parent_column) in KEY_VALUE_TABLES {
            manager
                .create_table(key_value_table(table, parent_column))
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(format!("idx_{}_http_id", table))
                        .table(Alias::new(table))
                        .col(KeyValue::HttpId)
                        .to_owned(),
                )
                .await?;
        }

        manager
            .create_table(
                Table::create()
                    .table(HttpBodyRaw::Table)
                    .if_not_exists()
                    .col(uuid(HttpBodyRaw::Id).primary_key())
                    .col(uuid(HttpBodyRaw::HttpId).unique_key())
                    .col(blob(HttpBodyRaw::RawData))
                    .col(blob_null(HttpBodyRaw::DeltaRawData))
                    .col(boolean(HttpBodyRaw::IsDelta))
                    .col(big_integer(HttpBodyRaw::CreatedAt))
                    .col(big_integer(HttpBodyRaw::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_http_body_raw_http_id")
                            .from(HttpBodyRaw::Table, HttpBodyRaw::HttpId)
                            .to(Http::Table, Http::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(HttpAssert::Table)
                    .if_not_exists()
                    .col(uuid(HttpAssert::Id).primary_key())
                    .col(uuid(HttpAssert::HttpId))
                    .col(text(HttpAssert::Value))
                    .col(boolean(HttpAssert::Enabled))
                    .col(text(HttpAssert::Description))
                    .col(double(HttpAssert::DisplayOrder))
                    .col(boolean(HttpAssert::IsDelta))
                    .col(uuid_null(HttpAssert::ParentHttpAssertId))
                    .col(text_null(HttpAssert::DeltaValue))
                    .col(boolean_null(HttpAssert::DeltaEnabled))
                    .col(text_null(HttpAssert::DeltaDescription))
                    .col(double_null(HttpAssert::DeltaDisplayOrder))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_http_assert_http_id")
                            .from(HttpAssert::Table, HttpAssert::HttpId)
                            .to(Http::Table, Http::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_http_assert_parent")
                            .from(HttpAssert::Table, HttpAssert::ParentHttpAssertId)
                            .to(HttpAssert::Table, HttpAssert::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_http_assert_http_id")
                    .table(HttpAssert::Table)
                    .col(HttpAssert::HttpId)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 5. Run history
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(HttpResponse::Table)
                    .if_not_exists()
                    .col(uuid(HttpResponse::Id).primary_key())
                    .col(uuid(HttpResponse::HttpId))
                    .col(integer(HttpResponse::Status))
                    .col(blob(HttpResponse::Body))
                    .col(big_integer(HttpResponse::Time))
                    .col(big_integer(HttpResponse::DurationMs))
                    .col(big_integer(HttpResponse::Size))
                    .col(big_integer(HttpResponse::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_http_response_http_id")
                            .from(HttpResponse::Table, HttpResponse::HttpId)
                            .to(Http::Table, Http::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_http_response_http_id")
                    .table(HttpResponse::Table)
                    .col(HttpResponse::HttpId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(HttpResponseHeader::Table)
                    .if_not_exists()
                    .col(uuid(HttpResponseHeader::Id).primary_key())
                    .col(uuid(HttpResponseHeader::ResponseId))
                    .col(string(HttpResponseHeader::HeaderKey))
                    .col(text(HttpResponseHeader::HeaderValue))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_http_response_header_response_id")
                            .from(HttpResponseHeader::Table, HttpResponseHeader::ResponseId)
                            .to(HttpResponse::Table, HttpResponse::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(HttpResponseAssert::Table)
                    .if_not_exists()
                    .col(uuid(HttpResponseAssert::Id).primary_key())
                    .col(uuid(HttpResponseAssert::ResponseId))
                    .col(text(HttpResponseAssert::Value))
                    .col(boolean(HttpResponseAssert::Success))
                    .col(big_integer(HttpResponseAssert::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_http_response_assert_response_id")
                            .from(HttpResponseAssert::Table, HttpResponseAssert::ResponseId)
                            .to(HttpResponse::Table, HttpResponse::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(HttpVersion::Table)
                    .if_not_exists()
                    .col(uuid(HttpVersion::Id).primary_key())
                    .col(uuid(HttpVersion::HttpId))
                    .col(uuid(HttpVersion::AuthorUserId))
                    .col(string(HttpVersion::Name))
                    .col(text(HttpVersion::Description))
                    .col(big_integer(HttpVersion::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_http_version_http_id")
                            .from(HttpVersion::Table, HttpVersion::HttpId)
                            .to(Http::Table, Http::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_http_version_http_id")
                    .table(HttpVersion::Table)
                    .col(HttpVersion::HttpId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let tables = [
            "http_version",
            "http_response_assert",
            "http_response_header",
            "http_response",
            "http_assert",
            "http_body_raw",
            "http_body_urlencoded",
            "http_body_form",
            "http_search_param",
            "http_header",
            "http",
            "variables",
            "environments",
            "workspace_users",
            "workspaces",
            "users",
        ];

        for table in tables {
            manager
                .drop_table(Table::drop().table(Alias::new(table)).if_exists().to_owned())
                .await?;
        }

        Ok(())
    }
}

fn key_value_table(table: &str, parent_column: &str) -> TableCreateStatement {
    Table::create()
        .table(Alias::new(table))
        .if_not_exists()
        .col(uuid(KeyValue::Id).primary_key())
        .col(uuid(KeyValue::HttpId))
        .col(string(KeyValue::Key))
        .col(text(KeyValue::Value))
        .col(boolean(KeyValue::Enabled))
        .col(text(KeyValue::Description))
        .col(double(KeyValue::DisplayOrder))
        .col(boolean(KeyValue::IsDelta))
        .col(uuid_null(Alias::new(parent_column)))
        .col(string_null(KeyValue::DeltaKey))
        .col(text_null(KeyValue::DeltaValue))
        .col(boolean_null(KeyValue::DeltaEnabled))
        .col(text_null(KeyValue::DeltaDescription))
        .col(double_null(KeyValue::DeltaDisplayOrder))
        .foreign_key(
            ForeignKey::create()
                .name(format!("fk_{}_http_id", table))
                .from(Alias::new(table), KeyValue::HttpId)
                .to(Http::Table, Http::Id)
                .on_delete(ForeignKeyAction::Cascade),
        )
        .foreign_key(
            ForeignKey::create()
                .name(format!("fk_{}_parent", table))
                .from(Alias::new(table), Alias::new(parent_column))
                .to(Alias::new(table), KeyValue::Id)
                .on_delete(ForeignKeyAction::Restrict),
        )
        .to_owned()
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Email,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Workspaces {
    Table,
    Id,
    Name,
    GlobalEnvId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum WorkspaceUsers {
    Table,
    Id,
    WorkspaceId,
    UserId,
    Role,
}

#[derive(DeriveIden)]
enum Environments {
    Table,
    Id,
    WorkspaceId,
    Name,
    Description,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Variables {
    Table,
    Id,
    EnvId,
    Key,
    Value,
    Enabled,
    Description,
    DisplayOrder,
}

#[derive(DeriveIden)]
enum Http {
    Table,
    Id,
    WorkspaceId,
    Name,
    Url,
    Method,
    Description,
    BodyKind,
    DisplayOrder,
    LastRunAt,
    ParentHttpId,
    IsDelta,
    DeltaName,
    DeltaUrl,
    DeltaMethod,
    DeltaDescription,
    DeltaBodyKind,
    IsSnapshot,
    CreatedAt,
    UpdatedAt,
}

/// Columns shared by the header, search param, form and url-encoded tables
#[derive(DeriveIden)]
enum KeyValue {
    Id,
    HttpId,
    Key,
    Value,
    Enabled,
    Description,
    DisplayOrder,
    IsDelta,
    DeltaKey,
    DeltaValue,
    DeltaEnabled,
    DeltaDescription,
    DeltaDisplayOrder,
}

#[derive(DeriveIden)]
enum HttpBodyRaw {
    Table,
    Id,
    HttpId,
    RawData,
    DeltaRawData,
    IsDelta,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum HttpAssert {
    Table,
    Id,
    HttpId,
    Value,
    Enabled,
    Description,
    DisplayOrder,
    IsDelta,
    ParentHttpAssertId,
    DeltaValue,
    DeltaEnabled,
    DeltaDescription,
    DeltaDisplayOrder,
}

#[derive(DeriveIden)]
enum HttpResponse {
    Table,
    Id,
    HttpId,
    Status,
    Body,
    Time,
    DurationMs,
    Size,
    CreatedAt,
}

#[derive(DeriveIden)]
enum HttpResponseHeader {
    Table,
    Id,
    ResponseId,
    HeaderKey,
    HeaderValue,
}

#[derive(DeriveIden)]
enum HttpResponseAssert {
    Table,
    Id,
    ResponseId,
    Value,
    Success,
    CreatedAt,
}

#[derive(DeriveIden)]
enum HttpVersion {
    Table,
    Id,
    HttpId,
    AuthorUserId,
    Name,
    Description,
    CreatedAt,
}
