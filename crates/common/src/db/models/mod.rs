//! SeaORM entity models

mod news;
mod report;
mod user;

pub use news::{
    Entity as NewsEntity,
    Model as NewsModel,
    ActiveModel as NewsActiveModel,
    Column as NewsColumn,
};

pub use report::{
    Entity as ReportEntity,
    Model as ReportModel,
    ActiveModel as ReportActiveModel,
    Column as ReportColumn,
};

pub use user::{
    Entity as UserEntity,
    Model as UserModel,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
};
