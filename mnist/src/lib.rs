pub mod mnist;

pub use crate::mnist::{
    IMAGE_MAGIC_NUMBER, LABEL_MAGIC_NUMBER, MnistError, MnistSet, OUTPUT_NODES, TEST_IMAGES,
    TEST_LABELS, TRAIN_IMAGES, TRAIN_LABELS, load_dataset, load_mnist_data, read_mnist_images,
    read_mnist_labels,
};
